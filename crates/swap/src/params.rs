//! SWAP parameter types.

use std::time::Duration;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Public SWAP profile, exchanged in the protocol handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Accepted max purchase price per unit; `None` disables buying, and
    /// with it cheque issuance.
    pub buy_at: Option<U256>,
    /// Offered sale price per unit.
    pub sell_at: U256,
    /// Debt units at which this side expects a cheque from its debtor.
    pub pay_at: u64,
    /// Debt units at which this side disconnects its debtor.
    pub drop_at: u64,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            buy_at: Some(U256::from(DEFAULT_BUY_AT)),
            sell_at: U256::from(DEFAULT_SELL_AT),
            pay_at: DEFAULT_PAY_AT,
            drop_at: DEFAULT_DROP_AT,
        }
    }
}

/// Local strategy for automatic deposits and automatic cashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    /// Interval between auto-cash rounds.
    pub auto_cash_interval: Duration,
    /// Uncashed amount that triggers cashing.
    pub auto_cash_threshold: U256,
    /// Interval between auto-deposit rounds.
    pub auto_deposit_interval: Duration,
    /// Chequebook balance that triggers a deposit.
    pub auto_deposit_threshold: U256,
    /// Surplus kept on the chequebook for fork protection.
    pub auto_deposit_buffer: U256,
}

impl Default for Strategy {
    fn default() -> Self {
        Self {
            auto_cash_interval: DEFAULT_AUTO_CASH_INTERVAL,
            auto_cash_threshold: default_auto_cash_threshold(),
            auto_deposit_interval: DEFAULT_AUTO_DEPOSIT_INTERVAL,
            auto_deposit_threshold: default_auto_deposit_threshold(),
            auto_deposit_buffer: default_auto_deposit_buffer(),
        }
    }
}

/// The local peer's full SWAP parameters: public profile plus private
/// strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    /// Profile advertised to the remote peer.
    pub profile: Profile,
    /// Local payment automation.
    pub strategy: Strategy,
}
