//! Message shapes exchanged with peer sessions.
//!
//! Only the shapes are defined here; encoding them onto the wire is the
//! transport layer's concern.

use std::time::Instant;

use apiary_primitives::{ChunkAddress, OverlayAddress};
use bytes::Bytes;

/// How a store request entered a peer's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    /// Response to a retrieve request this node can serve.
    Deliver,
    /// Unsolicited replication of a freshly stored chunk.
    Propagate,
}

/// Request for a chunk, forwarded along the routing overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveRequest {
    /// Content key. The zero key is a self-lookup: the requester asks for
    /// peers close to its own address instead of content.
    pub key: ChunkAddress,
    /// Request id; requesters sharing an id are coalesced downstream.
    pub id: u64,
    /// Largest chunk size the requester accepts; 0 means unlimited.
    pub max_size: u64,
    /// Cap on the number of peer addresses returned as routing hints.
    pub max_peers: u32,
    /// Deadline after which the requester is no longer interested.
    pub timeout: Option<Instant>,
}

impl RetrieveRequest {
    /// Whether this request asks for the requester's own neighbourhood.
    pub fn is_self_lookup(&self) -> bool {
        self.key.is_zero()
    }

    /// Whether the request deadline has passed.
    pub fn expired(&self) -> bool {
        self.timeout.is_some_and(|t| t <= Instant::now())
    }
}

/// Chunk delivery or replication push.
///
/// The first [`SPAN_SIZE`](apiary_primitives::SPAN_SIZE) bytes of `data`
/// encode the stored size little-endian.
#[derive(Debug, Clone)]
pub struct StoreRequest {
    /// Content key the data is claimed to live under.
    pub key: ChunkAddress,
    /// Id of the retrieve request being answered, or a fresh id when
    /// propagating.
    pub id: u64,
    /// Span-prefixed chunk bytes.
    pub data: Bytes,
    /// Deadline echoed from the retrieve request being answered.
    pub request_timeout: Option<Instant>,
}

/// Routing hints sent in immediate response to a retrieve request.
#[derive(Debug, Clone)]
pub struct PeersMessage {
    /// Key the hints are relative to; `None` when answering a self-lookup.
    pub key: Option<ChunkAddress>,
    /// Id echoed from the retrieve request.
    pub id: u64,
    /// Peer addresses in ascending distance from the key.
    pub peers: Vec<OverlayAddress>,
    /// Deadline echoed from the retrieve request.
    pub timeout: Option<Instant>,
}

/// Opaque provable promise of payment.
///
/// Issued by the outgoing payment collaborator, verified by the incoming
/// one; this crate never looks inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promise(
    /// Opaque payment evidence bytes.
    pub Bytes,
);

/// Cheque handed over when a payment threshold is crossed.
#[derive(Debug, Clone)]
pub struct PaymentMessage {
    /// Service units the promise covers.
    pub units: u32,
    /// Payment evidence.
    pub promise: Promise,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_zero_key_is_self_lookup() {
        let req = RetrieveRequest {
            key: ChunkAddress::ZERO,
            id: 1,
            max_size: 0,
            max_peers: 0,
            timeout: None,
        };
        assert!(req.is_self_lookup());
    }

    #[test]
    fn test_expiry() {
        let mut req = RetrieveRequest {
            key: ChunkAddress::with_last_byte(1),
            id: 1,
            max_size: 0,
            max_peers: 0,
            timeout: None,
        };
        assert!(!req.expired());

        req.timeout = Some(Instant::now() - Duration::from_secs(1));
        assert!(req.expired());

        req.timeout = Some(Instant::now() + Duration::from_secs(60));
        assert!(!req.expired());
    }
}
