//! SWAP errors.

use alloy_primitives::U256;
use apiary_api::AccountingError;

/// Errors surfaced by the SWAP ledger.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SwapError {
    /// A payment message must cover at least one unit.
    #[error("invalid units: 0")]
    InvalidUnits,

    /// The promise failed verification.
    #[error("invalid promise: {0}")]
    InvalidPromise(String),

    /// The verified amount does not match units times the agreed sale price.
    #[error(
        "invalid amount: expected {expected} ({units} units at agreed sale price), \
         promise signed over {actual}"
    )]
    InvalidAmount {
        /// Units claimed in the payment message.
        units: u32,
        /// `units * sell_at`.
        expected: U256,
        /// Amount the promise verified to.
        actual: U256,
    },

    /// Crediting the verified payment was refused by accounting.
    #[error(transparent)]
    Accounting(#[from] AccountingError),
}
