//! Service accounting at the peer-session seam.

/// Errors from metering service units against a peer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountingError {
    /// The peer's debt reached the disconnect threshold; the drop has been
    /// triggered.
    #[error("peer debt {balance} reached disconnect threshold {threshold}")]
    DebtThreshold {
        /// Balance at the moment the threshold was crossed.
        balance: i64,
        /// The configured disconnect threshold.
        threshold: u64,
    },

    /// Accounting for this peer was already dropped; no further units are
    /// accepted.
    #[error("accounting for peer already dropped")]
    Dropped,
}

/// Pairwise service metering attached to a peer session.
///
/// Positive units record service provided to the peer, negative units
/// service consumed from it. Crossing a threshold is the implementation's
/// business: it may pay, or it may disconnect the peer and refuse further
/// units.
pub trait ChunkAccounting: Send + Sync {
    /// Meter `units` of service against the peer.
    fn add(&self, units: i64) -> Result<(), AccountingError>;

    /// Snapshot of the current balance.
    fn balance(&self) -> i64;
}
