//! NetStore orchestration.

use std::sync::Arc;
use std::time::Instant;

use apiary_api::{
    DeliveryKind, Hive, PeerConnection, PeersMessage, RetrieveRequest, StoreRequest,
};
use apiary_primitives::{Chunk, ChunkAddress, OverlayAddress};
use apiary_storer::{ChunkStore, LocalStore};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{
    NetStoreConfig, NetStoreError, NetStoreResult, RequestIds, RequestStatus, RequestTable,
    SearchState,
};

/// Maximum number of requesters a retrieved chunk is delivered to, per
/// request id.
pub const REQUESTER_COUNT: usize = 3;

/// Network storage for chunks.
///
/// Entrypoint for chunk store and retrieval requests, local (the node's own
/// API) and remote (peer sessions), so every operation here runs under
/// heavy parallelism. Local storage is embedded; routing and peer selection
/// are delegated to the [`Hive`].
///
/// One exclusive lock serialises the ingress paths that open request
/// entries, transition their state and queue deliveries. The lock is never
/// held while waiting: a local [`get`](NetStore::get) suspends on the
/// request's done signal with the lock released, and propagation runs on a
/// spawned task. Methods that replicate chunks must therefore be called
/// from within a tokio runtime.
pub struct NetStore<S: ChunkStore> {
    local: LocalStore<S>,
    hive: Arc<dyn Hive>,
    requests: RequestTable,
    ids: RequestIds,
    config: NetStoreConfig,
    lock: Mutex<()>,
}

impl<S: ChunkStore + 'static> NetStore<S> {
    /// Create a network store over local storage and a routing overlay.
    pub fn new(local: LocalStore<S>, hive: Arc<dyn Hive>) -> Self {
        Self::with_config(local, hive, NetStoreConfig::default())
    }

    /// Create a network store with explicit configuration.
    pub fn with_config(local: LocalStore<S>, hive: Arc<dyn Hive>, config: NetStoreConfig) -> Self {
        Self {
            local,
            hive,
            requests: RequestTable::new(),
            ids: RequestIds::new(),
            config,
            lock: Mutex::new(()),
        }
    }

    /// The embedded local store.
    pub fn local(&self) -> &LocalStore<S> {
        &self.local
    }

    /// Search state of an in-flight request, if any.
    pub fn search_state(&self, key: &ChunkAddress) -> Option<SearchState> {
        self.requests.get(key).map(|status| status.state())
    }

    /// Entrypoint for local chunk store requests.
    ///
    /// Stores the chunk, wakes any waiters and delivers to their
    /// requesters; a chunk nobody asked for is propagated to the peers
    /// closest to it instead.
    pub fn put(self: &Arc<Self>, chunk: Chunk) {
        let _guard = self.lock.lock();

        if matches!(self.local.get(chunk.address()), Ok(Some(_))) {
            trace!(key = %chunk.address(), "chunk already stored");
            return;
        }

        self.store(chunk, None);
    }

    /// Entrypoint for local retrieve requests.
    ///
    /// Served straight from local storage when possible; otherwise a
    /// network search is started (or joined, when one is already under way
    /// for the key) and the call waits for delivery or the search timeout.
    pub async fn get(self: &Arc<Self>, key: ChunkAddress) -> NetStoreResult<Chunk> {
        let (status, mut done) = {
            let _guard = self.lock.lock();

            if let Some(chunk) = self.local.get(&key)? {
                trace!(%key, "served locally");
                return Ok(chunk);
            }

            let (status, created) = self.requests.open(key);
            let done = status.subscribe();
            if created {
                let req = RetrieveRequest {
                    key,
                    id: self.ids.next(),
                    max_size: 0,
                    max_peers: 0,
                    timeout: Some(Instant::now() + self.config.search_timeout),
                };
                self.start_search(&req, &status);
            }
            (status, done)
        };

        let deadline = tokio::time::timeout(self.config.search_timeout, done.wait_for(|v| *v));
        let outcome = deadline.await.is_ok_and(|inner| inner.is_ok());
        if outcome {
            match self.local.get(&key)? {
                Some(chunk) => {
                    trace!(%key, size = chunk.span(), "retrieved from network");
                    Ok(chunk)
                }
                // delivered but already collected again
                None => Err(NetStoreError::NotFound(key)),
            }
        } else {
            debug!(%key, "retrieve request timed out");
            self.requests.remove_if_idle(&key, &status);
            Err(NetStoreError::NotFound(key))
        }
    }

    /// Entrypoint for store requests arriving from a peer.
    ///
    /// Data that does not hash to its key is dropped here, whether or not
    /// anyone is waiting for it.
    pub fn add_store_request(self: &Arc<Self>, req: StoreRequest, from: Arc<dyn PeerConnection>) {
        let _guard = self.lock.lock();
        trace!(key = %req.key, id = req.id, peer = %from.address(), "store request");

        match self.local.get(&req.key) {
            Ok(Some(_)) => {
                trace!(key = %req.key, "already stored, request ignored");
                return;
            }
            Ok(None) => {}
            Err(err) => warn!(key = %req.key, %err, "local lookup failed"),
        }

        let chunk = match Chunk::with_address(req.key, req.data) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(
                    key = %req.key,
                    peer = %from.address(),
                    %err,
                    "chunk invalid, store request ignored"
                );
                return;
            }
        };

        self.store(chunk, Some(from.address()));
    }

    /// Entrypoint for retrieve requests arriving from a peer.
    ///
    /// Every non-lookup request costs the requester one unit of credit; an
    /// unpayable request is dropped. Served content goes out through the
    /// peer's syncer, missing content starts (or feeds) a network search.
    /// Routing hints are sent either way.
    pub fn add_retrieve_request(
        self: &Arc<Self>,
        mut req: RetrieveRequest,
        from: Arc<dyn PeerConnection>,
    ) {
        let _guard = self.lock.lock();

        if req.is_self_lookup() {
            trace!(peer = %from.address(), "self lookup, responding with peers only");
            self.send_peers(&req, &from);
            return;
        }

        trace!(key = %req.key, id = req.id, peer = %from.address(), "retrieve request");

        let local = match self.local.get(&req.key) {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(key = %req.key, %err, "local lookup failed");
                None
            }
        };

        if let Some(chunk) = local {
            // swap: record credit for one request
            if let Err(err) = from.accounting().add(1) {
                warn!(key = %req.key, peer = %from.address(), %err, "cannot process retrieve request");
                return;
            }

            if req.max_size == 0 || req.max_size >= chunk.span() {
                debug!(key = %req.key, peer = %from.address(), "content found, delivering");
                let msg = StoreRequest {
                    key: req.key,
                    id: req.id,
                    data: chunk.data().clone(),
                    request_timeout: req.timeout,
                };
                if let Err(err) = from.enqueue(msg, DeliveryKind::Deliver) {
                    debug!(peer = %from.address(), %err, "delivery abandoned");
                }
            }

            self.send_peers(&req, &from);
            return;
        }

        let (status, _created) = self.requests.open(req.key);
        if status.state() == SearchState::Searching {
            req.timeout = Some(self.clamp_timeout(req.timeout));
        }
        status.add_requester(req.clone(), Arc::clone(&from));

        if let Err(err) = from.accounting().add(1) {
            warn!(key = %req.key, peer = %from.address(), %err, "cannot process retrieve request");
            return;
        }

        self.start_search(&req, &status);
        self.send_peers(&req, &from);
    }

    // Store logic common to local and network requests: persist, then
    // either close the open request and deliver, or hand the chunk to the
    // neighbourhood.
    fn store(self: &Arc<Self>, chunk: Chunk, source: Option<OverlayAddress>) {
        if let Err(err) = self.local.put(&chunk) {
            // the memory tier has the chunk; delivery still works
            warn!(key = %chunk.address(), %err, "persisting chunk failed");
        }

        match self.requests.get(chunk.address()) {
            Some(status) => {
                if status.close() {
                    self.deliver(&chunk, &status);
                }
                self.requests.remove(chunk.address());
            }
            None => {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    this.propagate(&chunk, source);
                });
            }
        }
    }

    // Forward the retrieve request to the closest peer that accepts the
    // charge, skipping peers that asked us for the same chunk. One forward
    // per invocation: further peers are tried lazily as more requests for
    // the key come in.
    fn start_search(&self, req: &RetrieveRequest, status: &RequestStatus) {
        status.set_searching();

        let peers = self.hive.get_peers(&req.key, 0);
        trace!(key = %req.key, candidates = peers.len(), "starting network search");

        for peer in peers {
            if status.is_requester(&peer.address()) {
                continue;
            }

            // swap: spend one credit on the forwarded request
            match peer.accounting().add(-1) {
                Ok(()) => {
                    if let Err(err) = peer.retrieve(req.clone()) {
                        debug!(key = %req.key, peer = %peer.address(), %err, "forward failed");
                        continue;
                    }
                    trace!(key = %req.key, peer = %peer.address(), "retrieve request forwarded");
                    return;
                }
                Err(err) => {
                    warn!(key = %req.key, peer = %peer.address(), %err, "unable to charge peer");
                }
            }
        }

        debug!(key = %req.key, "no peer took the search");
    }

    // Deliver a found chunk to its requesters, per request id in insertion
    // order, capped at REQUESTER_COUNT. Expired requesters are skipped
    // silently.
    fn deliver(&self, chunk: &Chunk, status: &RequestStatus) {
        for (id, requesters) in status.requesters() {
            let msg = StoreRequest {
                key: *chunk.address(),
                id,
                data: chunk.data().clone(),
                request_timeout: None,
            };

            let mut counter = REQUESTER_COUNT;
            let mut sent = 0usize;
            for requester in &requesters {
                if requester.req.expired() {
                    continue;
                }
                match requester.peer.enqueue(msg.clone(), DeliveryKind::Deliver) {
                    Ok(()) => sent += 1,
                    Err(err) => {
                        debug!(peer = %requester.peer.address(), %err, "delivery abandoned")
                    }
                }
                counter -= 1;
                if counter == 0 {
                    break;
                }
            }
            debug!(key = %chunk.address(), id, sent, "delivered chunk to requesters");
        }
    }

    // Push a freshly stored chunk to the peers closest to it, except
    // whoever sent it here. Queueing is the syncer's business.
    fn propagate(&self, chunk: &Chunk, source: Option<OverlayAddress>) {
        let msg = StoreRequest {
            key: *chunk.address(),
            id: self.ids.next(),
            data: chunk.data().clone(),
            request_timeout: None,
        };

        let mut sent = 0usize;
        for peer in self.hive.get_peers(chunk.address(), 0) {
            if source.is_some_and(|src| src == peer.address()) {
                continue;
            }
            match peer.enqueue(msg.clone(), DeliveryKind::Propagate) {
                Ok(()) => sent += 1,
                Err(err) => debug!(peer = %peer.address(), %err, "propagation skipped"),
            }
        }
        debug!(key = %chunk.address(), peers = sent, "propagated chunk");
    }

    // The immediate response to a retrieve request: relevant peer
    // addresses from the hive. A zero key resolves to the requester's own
    // address and is answered without a key.
    fn send_peers(&self, req: &RetrieveRequest, from: &Arc<dyn PeerConnection>) {
        if req.expired() {
            return;
        }

        let (target, reply_key) = if req.key.is_zero() {
            (from.address(), None)
        } else {
            (req.key, Some(req.key))
        };

        let peers: Vec<OverlayAddress> = self
            .hive
            .get_peers(&target, req.max_peers as usize)
            .iter()
            .map(|peer| peer.address())
            .collect();

        trace!(peer = %from.address(), id = req.id, count = peers.len(), "sending peer addresses");
        let msg = PeersMessage {
            key: reply_key,
            id: req.id,
            peers,
            timeout: req.timeout,
        };
        if let Err(err) = from.peers(msg) {
            debug!(peer = %from.address(), %err, "peers reply failed");
        }
    }

    // Deadline for a response while a search is live: the request's own
    // deadline, bounded by one search timeout from now.
    fn clamp_timeout(&self, timeout: Option<Instant>) -> Instant {
        let bound = Instant::now() + self.config.search_timeout;
        timeout.map_or(bound, |t| t.min(bound))
    }
}
