//! SWAP collaborator traits.
//!
//! The ledger never touches keys, chains or sockets itself; issuing,
//! verifying and communicating payments are delegated through these traits.

use std::time::Duration;

use alloy_primitives::U256;
use apiary_api::Promise;

/// Result alias for payment collaborator operations.
pub type PaymentResult<T> = Result<T, PaymentError>;

/// Errors from the payment collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    /// The chequebook cannot cover the amount.
    #[error("insufficient funds for {amount}")]
    InsufficientFunds {
        /// The amount that could not be covered.
        amount: U256,
    },

    /// The promise failed verification.
    #[error("promise rejected: {0}")]
    InvalidPromise(String),

    /// Backend failure (chain, signer, storage).
    #[error("payment backend: {0}")]
    Backend(String),
}

/// Peer communication surface for payment events.
pub trait PaymentProtocol: Send + Sync {
    /// Hand the peer a payment promise covering `units` of service.
    fn pay(&self, units: u64, promise: Promise);

    /// Disconnect the peer for running up too much debt.
    fn drop_peer(&self);
}

/// Outgoing payment system with automatic deposits.
pub trait OutPayment: Send + Sync {
    /// Issue a promise over `amount`. Insolvency is an error; no promise
    /// leaves this side without cover.
    fn issue(&self, amount: U256) -> PaymentResult<Promise>;

    /// (Re)schedule automatic deposits.
    fn auto_deposit(&self, interval: Duration, threshold: U256, buffer: U256);

    /// Stop the deposit scheduler.
    fn stop(&self);
}

/// Incoming payment system with automatic cashing.
pub trait InPayment: Send + Sync {
    /// Verify a promise and return the amount it is good for.
    fn receive(&self, promise: &Promise) -> PaymentResult<U256>;

    /// (Re)schedule automatic cashing.
    fn auto_cash(&self, interval: Duration, threshold: U256);

    /// Stop the cashing scheduler.
    fn stop(&self);
}
