//! SWAP: pairwise accounting and payments for chunk service.
//!
//! Each peer session carries one [`Swap`] instance metering service units
//! both ways. Crossing the remote peer's payment threshold issues a cheque
//! through the outgoing payment collaborator; a peer that runs up debt past
//! the local disconnect threshold is dropped. Payment is opportunistic: a
//! failed cheque is not an error, the creditor simply drops us eventually.

mod constants;
mod error;
mod params;
mod swap;
mod traits;

pub use constants::*;
pub use error::SwapError;
pub use params::{Params, Profile, Strategy};
pub use swap::Swap;
pub use traits::{InPayment, OutPayment, PaymentError, PaymentProtocol, PaymentResult};

// the promise travels in api::PaymentMessage; re-export for implementors
pub use apiary_api::Promise;
