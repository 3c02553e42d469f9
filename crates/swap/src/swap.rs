//! The per-peer SWAP ledger.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use alloy_primitives::U256;
use apiary_api::{AccountingError, ChunkAccounting, Promise};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{InPayment, OutPayment, Params, PaymentProtocol, Profile, SwapError};

struct Ledger {
    /// Units of chunk/retrieval service. Positive: the remote peer owes us.
    balance: i64,
    /// Set once the debt threshold fired; no units are accepted after.
    dropped: bool,
    local: Params,
    remote: Profile,
}

/// The SWAP instance of one peer session.
///
/// One mutex guards balance and parameters across every operation. Payment
/// is opportunistic: [`Swap::send`] failing to issue a cheque keeps the
/// balance and retries on the next threshold crossing, while the remote
/// side is free to drop us if we stay indebted.
pub struct Swap {
    ledger: Mutex<Ledger>,
    out: Arc<dyn OutPayment>,
    incoming: Arc<dyn InPayment>,
    proto: Arc<dyn PaymentProtocol>,
    stopped: AtomicBool,
}

impl Swap {
    /// Create the ledger for a session and schedule payment automation
    /// from the local strategy.
    pub fn new(
        local: Params,
        remote: Profile,
        out: Arc<dyn OutPayment>,
        incoming: Arc<dyn InPayment>,
        proto: Arc<dyn PaymentProtocol>,
    ) -> Self {
        let swap = Self {
            ledger: Mutex::new(Ledger {
                balance: 0,
                dropped: false,
                local,
                remote,
            }),
            out,
            incoming,
            proto,
            stopped: AtomicBool::new(false),
        };
        let ledger = swap.ledger.lock();
        swap.schedule(&ledger.local);
        drop(ledger);
        swap
    }

    /// Meter `units` of service.
    ///
    /// Positive units are service promised or provided to the peer,
    /// negative units service used. Reaching the local drop threshold
    /// disconnects the peer and poisons the ledger; reaching the remote
    /// payment threshold triggers a cheque.
    pub fn add(&self, units: i64) -> Result<(), AccountingError> {
        let mut ledger = self.ledger.lock();
        if ledger.dropped {
            return Err(AccountingError::Dropped);
        }

        ledger.balance += units;

        let drop_at = ledger.local.profile.drop_at;
        if ledger.balance >= drop_at as i64 {
            warn!(
                balance = ledger.balance,
                threshold = drop_at,
                "peer has too much debt, dropping"
            );
            ledger.dropped = true;
            self.proto.drop_peer();
            return Err(AccountingError::DebtThreshold {
                balance: ledger.balance,
                threshold: drop_at,
            });
        }

        if ledger.balance <= -(ledger.remote.pay_at as i64) {
            self.send(&mut ledger);
        }

        Ok(())
    }

    /// Snapshot of the current balance.
    pub fn balance(&self) -> i64 {
        self.ledger.lock().balance
    }

    // Called with the ledger lock held; must not block on network. In case
    // of insolvency no promise is issued: safe against fraud, and the
    // balance hangs on until the remote drops us.
    fn send(&self, ledger: &mut Ledger) {
        if ledger.local.profile.buy_at.is_none() || ledger.balance >= 0 {
            return;
        }

        let units = (-ledger.balance) as u64;
        let amount = U256::from(units) * ledger.remote.sell_at;
        match self.out.issue(amount) {
            Ok(promise) => {
                debug!(units, %amount, "cheque issued");
                self.proto.pay(units, promise);
                ledger.balance = 0;
            }
            Err(err) => {
                warn!(%amount, %err, "cannot issue cheque");
            }
        }
    }

    /// Handle an incoming payment message.
    ///
    /// The promise must verify to exactly `units` times the locally offered
    /// sale price; the verified payment then credits the peer.
    pub fn receive(&self, units: u32, promise: Promise) -> Result<(), SwapError> {
        if units == 0 {
            return Err(SwapError::InvalidUnits);
        }

        let expected = {
            let ledger = self.ledger.lock();
            U256::from(units) * ledger.local.profile.sell_at
        };

        let actual = self
            .incoming
            .receive(&promise)
            .map_err(|err| SwapError::InvalidPromise(err.to_string()))?;
        if actual != expected {
            return Err(SwapError::InvalidAmount {
                units,
                expected,
                actual,
            });
        }

        self.add(-(units as i64))?;
        trace!(units, %actual, "payment received");
        Ok(())
    }

    /// Set the remote profile, e.g. from the handshake.
    pub fn set_remote(&self, remote: Profile) {
        let mut ledger = self.ledger.lock();
        debug!(
            pay_at = remote.pay_at,
            drop_at = remote.drop_at,
            "remote profile set"
        );
        ledger.remote = remote;
    }

    /// Replace the local parameters and reschedule payment automation.
    pub fn set_params(&self, local: Params) {
        let mut ledger = self.ledger.lock();
        self.schedule(&local);
        ledger.local = local;
    }

    fn schedule(&self, local: &Params) {
        let strategy = &local.strategy;
        self.incoming
            .auto_cash(strategy.auto_cash_interval, strategy.auto_cash_threshold);
        self.out.auto_deposit(
            strategy.auto_deposit_interval,
            strategy.auto_deposit_threshold,
            strategy.auto_deposit_buffer,
        );
    }

    /// Stop both payment schedulers. Idempotent.
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.out.stop();
            self.incoming.stop();
        }
    }
}

impl ChunkAccounting for Swap {
    fn add(&self, units: i64) -> Result<(), AccountingError> {
        Swap::add(self, units)
    }

    fn balance(&self) -> i64 {
        Swap::balance(self)
    }
}
