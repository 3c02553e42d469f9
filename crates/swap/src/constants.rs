//! Default SWAP parameters.

use std::time::Duration;

use alloy_primitives::U256;

/// Default accepted purchase price per unit, in wei.
pub const DEFAULT_BUY_AT: u64 = 20_000_000_000;

/// Default offered sale price per unit, in wei.
pub const DEFAULT_SELL_AT: u64 = 20_000_000_000;

/// Default debt units at which the creditor expects a cheque.
pub const DEFAULT_PAY_AT: u64 = 100;

/// Default debt units at which the creditor disconnects.
pub const DEFAULT_DROP_AT: u64 = 10_000;

/// Default interval between auto-cash rounds.
pub const DEFAULT_AUTO_CASH_INTERVAL: Duration = Duration::from_secs(300);

/// Default uncashed amount that triggers cashing, in wei.
pub fn default_auto_cash_threshold() -> U256 {
    U256::from(50_000_000_000_000u64)
}

/// Default interval between auto-deposit rounds.
pub const DEFAULT_AUTO_DEPOSIT_INTERVAL: Duration = Duration::from_secs(300);

/// Default chequebook balance that triggers a deposit, in wei.
pub fn default_auto_deposit_threshold() -> U256 {
    U256::from(50_000_000_000_000u64)
}

/// Default surplus kept on the chequebook for fork protection, in wei.
pub fn default_auto_deposit_buffer() -> U256 {
    U256::from(100_000_000_000_000u64)
}
