//! Reference routing overlay over the connected peer set.

use std::collections::HashMap;
use std::sync::Arc;

use apiary_api::{Hive, PeerConnection};
use apiary_primitives::{distance_cmp, OverlayAddress};
use parking_lot::RwLock;
use tracing::trace;

/// How many peers a lookup returns when the caller asks for the default.
pub const DEFAULT_MAX_PEERS: usize = 8;

/// In-memory [`Hive`] backed by the set of connected peer sessions.
///
/// Lookups sort the registry by XOR distance on demand; good for the peer
/// counts a single node actually holds. A session is registered when its
/// handshake completes and removed when it disconnects.
#[derive(Default)]
pub struct PeerRegistry {
    peers: RwLock<HashMap<OverlayAddress, Arc<dyn PeerConnection>>>,
}

impl PeerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer session. Returns false if the address was already
    /// present; the existing session wins.
    pub fn add(&self, peer: Arc<dyn PeerConnection>) -> bool {
        let mut peers = self.peers.write();
        let addr = peer.address();
        if peers.contains_key(&addr) {
            return false;
        }
        trace!(%addr, "peer registered");
        peers.insert(addr, peer);
        true
    }

    /// Remove a peer session by address.
    pub fn remove(&self, addr: &OverlayAddress) -> Option<Arc<dyn PeerConnection>> {
        let removed = self.peers.write().remove(addr);
        if removed.is_some() {
            trace!(%addr, "peer removed");
        }
        removed
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    /// Whether no session is registered.
    pub fn is_empty(&self) -> bool {
        self.peers.read().is_empty()
    }
}

impl Hive for PeerRegistry {
    fn get_peers(&self, key: &OverlayAddress, max: usize) -> Vec<Arc<dyn PeerConnection>> {
        let max = if max == 0 { DEFAULT_MAX_PEERS } else { max };

        let mut peers: Vec<_> = self.peers.read().values().cloned().collect();
        peers.sort_by(|a, b| distance_cmp(key, &a.address(), &b.address()));
        peers.truncate(max);
        peers
    }
}
