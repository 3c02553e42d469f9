//! The wire boundary of one connected peer session.

use apiary_primitives::OverlayAddress;

use crate::{ChunkAccounting, DeliveryKind, PeersMessage, RetrieveRequest, StoreRequest};

/// Result alias for peer session operations.
pub type PeerResult<T> = Result<T, PeerError>;

/// Errors from the peer session boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeerError {
    /// The session is gone; whatever was being sent is abandoned.
    #[error("peer disconnected")]
    Disconnected,

    /// The outbound queue refused the message.
    #[error("outbound queue full")]
    QueueFull,
}

/// One connected peer session as the store sees it.
///
/// `enqueue` is the syncer boundary: an ordered, backpressured, best-effort
/// outbound queue that must not block the caller. `retrieve` and `peers`
/// are immediate sends. No delivery guarantee is made beyond "the session
/// accepted it".
pub trait PeerConnection: Send + Sync {
    /// Overlay address of the remote peer.
    fn address(&self) -> OverlayAddress;

    /// Forward a retrieve request to the peer.
    fn retrieve(&self, req: RetrieveRequest) -> PeerResult<()>;

    /// Send routing hints to the peer.
    fn peers(&self, msg: PeersMessage) -> PeerResult<()>;

    /// Queue a store request on the peer's syncer.
    fn enqueue(&self, req: StoreRequest, kind: DeliveryKind) -> PeerResult<()>;

    /// Accounting ledger of this peer session.
    fn accounting(&self) -> &dyn ChunkAccounting;
}
