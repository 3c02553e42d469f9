//! Per-key request coalescing.
//!
//! The first request for a missing chunk opens a [`RequestStatus`]; every
//! further request for the same key joins it. The status tracks which peers
//! asked under which request id and carries a one-shot broadcast that fires
//! when the chunk arrives, so any number of local waiters block on the same
//! signal. Statuses live in a [`RequestTable`] keyed by content address;
//! the chunk cache itself only ever holds data-bearing chunks.

use std::collections::HashMap;
use std::sync::Arc;

use apiary_api::{PeerConnection, RetrieveRequest};
use apiary_primitives::{ChunkAddress, OverlayAddress};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

/// Search progress for one (key, generation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// A network search is (or may be) under way.
    Searching,
    /// The chunk has arrived; the done signal has fired.
    Found,
}

/// One upstream peer waiting for a chunk under a request id.
pub struct Requester {
    /// The retrieve request as received, with its clamped deadline.
    pub req: RetrieveRequest,
    /// The session to deliver to.
    pub peer: Arc<dyn PeerConnection>,
}

impl Clone for Requester {
    fn clone(&self) -> Self {
        Self {
            req: self.req.clone(),
            peer: Arc::clone(&self.peer),
        }
    }
}

struct Inner {
    state: SearchState,
    requesters: HashMap<u64, Vec<Requester>>,
}

/// Shared status of one in-flight chunk request.
///
/// The Searching to Found transition is monotonic and broadcasts the done
/// signal exactly once. Requesters may still be appended after Found; they
/// are served by delivery, not by another search.
pub struct RequestStatus {
    key: ChunkAddress,
    inner: Mutex<Inner>,
    done: watch::Sender<bool>,
}

impl RequestStatus {
    fn new(key: ChunkAddress) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            key,
            inner: Mutex::new(Inner {
                state: SearchState::Searching,
                requesters: HashMap::new(),
            }),
            done,
        }
    }

    /// The key being searched for.
    pub fn key(&self) -> &ChunkAddress {
        &self.key
    }

    /// Current search state.
    pub fn state(&self) -> SearchState {
        self.inner.lock().state
    }

    /// Subscribe to the done signal.
    ///
    /// The receiver observes completion even when it subscribes after the
    /// broadcast.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.done.subscribe()
    }

    /// Number of live done-signal subscribers.
    pub fn waiters(&self) -> usize {
        self.done.receiver_count()
    }

    /// Record a network search being (re)started.
    pub fn set_searching(&self) {
        let mut inner = self.inner.lock();
        // Found is terminal
        if inner.state != SearchState::Found {
            inner.state = SearchState::Searching;
        }
    }

    /// Append an upstream requester under its request id.
    ///
    /// Requesters of one id are kept in insertion order; that is the order
    /// deliveries go out in.
    pub fn add_requester(&self, req: RetrieveRequest, peer: Arc<dyn PeerConnection>) {
        trace!(key = %self.key, id = req.id, peer = %peer.address(), "requester added");
        let mut inner = self.inner.lock();
        inner
            .requesters
            .entry(req.id)
            .or_default()
            .push(Requester { req, peer });
    }

    /// Whether `addr` already requested this chunk under any id.
    pub fn is_requester(&self, addr: &OverlayAddress) -> bool {
        let inner = self.inner.lock();
        inner
            .requesters
            .values()
            .flatten()
            .any(|requester| requester.peer.address() == *addr)
    }

    /// Whether any upstream requester is registered.
    pub fn has_requesters(&self) -> bool {
        !self.inner.lock().requesters.is_empty()
    }

    /// Snapshot of all requesters, grouped by id.
    pub fn requesters(&self) -> Vec<(u64, Vec<Requester>)> {
        let inner = self.inner.lock();
        inner
            .requesters
            .iter()
            .map(|(id, list)| (*id, list.clone()))
            .collect()
    }

    /// Transition to Found and broadcast the done signal.
    ///
    /// Returns whether this call performed the transition; at most one
    /// caller ever sees `true`.
    pub fn close(&self) -> bool {
        {
            let mut inner = self.inner.lock();
            if inner.state == SearchState::Found {
                return false;
            }
            inner.state = SearchState::Found;
        }
        self.done.send_replace(true);
        true
    }
}

/// Table of in-flight chunk requests, keyed by content address.
#[derive(Default)]
pub struct RequestTable {
    entries: Mutex<HashMap<ChunkAddress, Arc<RequestStatus>>>,
}

impl RequestTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the status for `key`, opening one if absent.
    ///
    /// Returns the status and whether this call created it: the creator is
    /// the one request of a generation that starts the network search.
    pub fn open(&self, key: ChunkAddress) -> (Arc<RequestStatus>, bool) {
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(status) => (Arc::clone(status), false),
            None => {
                let status = Arc::new(RequestStatus::new(key));
                entries.insert(key, Arc::clone(&status));
                (status, true)
            }
        }
    }

    /// The status for `key`, if any.
    pub fn get(&self, key: &ChunkAddress) -> Option<Arc<RequestStatus>> {
        self.entries.lock().get(key).map(Arc::clone)
    }

    /// Drop the entry for `key`.
    pub fn remove(&self, key: &ChunkAddress) -> Option<Arc<RequestStatus>> {
        self.entries.lock().remove(key)
    }

    /// Drop `status` if it is still the entry for `key` and nothing is
    /// attached to it: still Searching, no upstream requesters and no done
    /// subscriber beyond the caller's own.
    ///
    /// Called by the last local waiter on its way out so unresolved keys do
    /// not accumulate.
    pub fn remove_if_idle(&self, key: &ChunkAddress, status: &Arc<RequestStatus>) -> bool {
        let mut entries = self.entries.lock();
        let idle = entries.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, status)
                && status.state() == SearchState::Searching
                && !status.has_requesters()
                && status.waiters() <= 1
        });
        if idle {
            entries.remove(key);
            trace!(%key, "idle request entry dropped");
        }
        idle
    }

    /// Number of in-flight entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no request is in flight.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
