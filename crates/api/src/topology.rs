//! The routing overlay interface.

use std::sync::Arc;

use apiary_primitives::OverlayAddress;

use crate::PeerConnection;

/// Routing overlay handing out connected peers by distance to a key.
///
/// Chunk keys and overlay addresses share the metric space, so the same
/// lookup routes both content and neighbourhood queries.
#[auto_impl::auto_impl(&, Arc)]
pub trait Hive: Send + Sync {
    /// Up to `max` connected peers, ascending XOR distance from `key`.
    ///
    /// `max == 0` asks for an implementation-defined default.
    fn get_peers(&self, key: &OverlayAddress, max: usize) -> Vec<Arc<dyn PeerConnection>>;
}
