//! NetStore end-to-end behaviour, driven through mock peers and a mock
//! routing overlay.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use apiary_api::{
    AccountingError, ChunkAccounting, DeliveryKind, Hive, PeerConnection, PeerError, PeerResult,
    PeersMessage, RetrieveRequest, StoreRequest,
};
use apiary_netstore::{NetStore, NetStoreConfig, SearchState};
use apiary_primitives::{Chunk, ChunkAddress, OverlayAddress};
use apiary_storer::{LocalStore, MemoryChunkStore, StoreParams};
use parking_lot::Mutex;

const SEARCH_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Default)]
struct MeteredAccounting {
    balance: Mutex<i64>,
    fail: AtomicBool,
}

impl ChunkAccounting for MeteredAccounting {
    fn add(&self, units: i64) -> Result<(), AccountingError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AccountingError::Dropped);
        }
        *self.balance.lock() += units;
        Ok(())
    }

    fn balance(&self) -> i64 {
        *self.balance.lock()
    }
}

#[derive(Default)]
struct PeerLog {
    retrieves: Vec<RetrieveRequest>,
    peers_msgs: Vec<PeersMessage>,
    enqueued: Vec<(StoreRequest, DeliveryKind)>,
}

struct TestPeer {
    addr: OverlayAddress,
    accounting: MeteredAccounting,
    log: Mutex<PeerLog>,
    disconnected: AtomicBool,
}

impl TestPeer {
    fn new(n: u8) -> Arc<Self> {
        Arc::new(Self {
            addr: OverlayAddress::with_last_byte(n),
            accounting: MeteredAccounting::default(),
            log: Mutex::new(PeerLog::default()),
            disconnected: AtomicBool::new(false),
        })
    }

    fn retrieves(&self) -> Vec<RetrieveRequest> {
        self.log.lock().retrieves.clone()
    }

    fn peers_msgs(&self) -> Vec<PeersMessage> {
        self.log.lock().peers_msgs.clone()
    }

    fn sent(&self, kind: DeliveryKind) -> Vec<StoreRequest> {
        self.log
            .lock()
            .enqueued
            .iter()
            .filter(|(_, k)| *k == kind)
            .map(|(req, _)| req.clone())
            .collect()
    }
}

impl PeerConnection for TestPeer {
    fn address(&self) -> OverlayAddress {
        self.addr
    }

    fn retrieve(&self, req: RetrieveRequest) -> PeerResult<()> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(PeerError::Disconnected);
        }
        self.log.lock().retrieves.push(req);
        Ok(())
    }

    fn peers(&self, msg: PeersMessage) -> PeerResult<()> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(PeerError::Disconnected);
        }
        self.log.lock().peers_msgs.push(msg);
        Ok(())
    }

    fn enqueue(&self, req: StoreRequest, kind: DeliveryKind) -> PeerResult<()> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(PeerError::Disconnected);
        }
        self.log.lock().enqueued.push((req, kind));
        Ok(())
    }

    fn accounting(&self) -> &dyn ChunkAccounting {
        &self.accounting
    }
}

struct TestHive {
    peers: Vec<Arc<dyn PeerConnection>>,
    calls: AtomicUsize,
}

impl TestHive {
    fn of(peers: &[Arc<TestPeer>]) -> Arc<Self> {
        Arc::new(Self {
            peers: peers
                .iter()
                .map(|p| Arc::clone(p) as Arc<dyn PeerConnection>)
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Hive for TestHive {
    fn get_peers(&self, _key: &OverlayAddress, max: usize) -> Vec<Arc<dyn PeerConnection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let max = if max == 0 { self.peers.len() } else { max };
        self.peers.iter().take(max).cloned().collect()
    }
}

fn netstore(hive: Arc<TestHive>) -> Arc<NetStore<MemoryChunkStore>> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut params = StoreParams::new("unused");
    params.db_capacity = 1_000;
    params.cache_capacity = 100;
    let local = LocalStore::new(MemoryChunkStore::new(), &params).unwrap();
    let config = NetStoreConfig {
        search_timeout: SEARCH_TIMEOUT,
    };
    Arc::new(NetStore::with_config(local, hive, config))
}

fn retrieve_req(key: ChunkAddress, id: u64) -> RetrieveRequest {
    RetrieveRequest {
        key,
        id,
        max_size: 0,
        max_peers: 0,
        timeout: Some(Instant::now() + Duration::from_secs(10)),
    }
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn local_hit_served_without_network() {
    let hive = TestHive::of(&[]);
    let store = netstore(hive.clone());

    let chunk = Chunk::from_payload(b"abc");
    store.local().put(&chunk).unwrap();

    let got = store.get(*chunk.address()).await.unwrap();
    assert_eq!(got, chunk);
    assert_eq!(got.span(), 3);
    assert_eq!(hive.calls(), 0);
}

#[tokio::test]
async fn network_retrieval_delivers_to_waiter() {
    let peers = [TestPeer::new(1), TestPeer::new(2), TestPeer::new(3)];
    let hive = TestHive::of(&peers);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"remote content");
    let key = *chunk.address();

    let getter = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.get(key).await })
    };

    // the search forwards to the closest peer only, after charging it
    wait_until(|| !peers[0].retrieves().is_empty()).await;
    assert_eq!(peers[0].accounting.balance(), -1);
    assert!(peers[1].retrieves().is_empty());
    assert!(peers[2].retrieves().is_empty());

    let forwarded = peers[0].retrieves()[0].clone();
    assert_eq!(forwarded.key, key);

    store.add_store_request(
        StoreRequest {
            key,
            id: forwarded.id,
            data: chunk.data().clone(),
            request_timeout: None,
        },
        peers[0].clone(),
    );

    let got = getter.await.unwrap().unwrap();
    assert_eq!(got, chunk);

    // resolved requests leave no entry behind
    assert!(store.search_state(&key).is_none());
}

#[tokio::test]
async fn concurrent_gets_share_one_search() {
    let peers = [TestPeer::new(1)];
    let hive = TestHive::of(&peers);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"coalesced");
    let key = *chunk.address();

    let first = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.get(key).await })
    };
    let second = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.get(key).await })
    };

    wait_until(|| !peers[0].retrieves().is_empty()).await;
    // give the second caller a chance to join before resolution
    tokio::time::sleep(Duration::from_millis(20)).await;

    store.add_store_request(
        StoreRequest {
            key,
            id: peers[0].retrieves()[0].id,
            data: chunk.data().clone(),
            request_timeout: None,
        },
        peers[0].clone(),
    );

    assert_eq!(first.await.unwrap().unwrap(), chunk);
    assert_eq!(second.await.unwrap().unwrap(), chunk);

    // exactly one retrieve request left this node
    assert_eq!(peers[0].retrieves().len(), 1);
}

#[tokio::test]
async fn get_times_out_with_no_peers() {
    let hive = TestHive::of(&[]);
    let store = netstore(hive);
    let key = *Chunk::from_payload(b"nowhere").address();

    let started = Instant::now();
    let err = store.get(key).await.unwrap_err();
    assert!(matches!(err, apiary_netstore::NetStoreError::NotFound(k) if k == key));
    assert!(started.elapsed() >= SEARCH_TIMEOUT);

    // the last waiter cleans up the idle entry
    assert!(store.search_state(&key).is_none());
}

#[tokio::test]
async fn invalid_inbound_data_is_ignored() {
    let peers = [TestPeer::new(1)];
    let hive = TestHive::of(&peers);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"genuine");
    let bogus = Chunk::from_payload(b"bogus");
    let key = *chunk.address();

    let getter = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.get(key).await })
    };
    wait_until(|| !peers[0].retrieves().is_empty()).await;

    // data that does not hash to the key must not resolve the request
    store.add_store_request(
        StoreRequest {
            key,
            id: peers[0].retrieves()[0].id,
            data: bogus.data().clone(),
            request_timeout: None,
        },
        peers[0].clone(),
    );

    assert_eq!(store.search_state(&key), Some(SearchState::Searching));
    assert!(matches!(
        getter.await.unwrap(),
        Err(apiary_netstore::NetStoreError::NotFound(_))
    ));
    assert!(store.local().get(&key).unwrap().is_none());
}

#[tokio::test]
async fn delivery_capped_at_three_per_id() {
    let requesters: Vec<_> = (1..=5).map(TestPeer::new).collect();
    let hive = TestHive::of(&[]);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"popular");
    let key = *chunk.address();

    for peer in &requesters {
        store.add_retrieve_request(retrieve_req(key, 42), peer.clone());
    }

    store.put(chunk.clone());

    let delivered: Vec<_> = requesters
        .iter()
        .map(|p| p.sent(DeliveryKind::Deliver).len())
        .collect();
    assert_eq!(delivered, vec![1, 1, 1, 0, 0]);

    // every metered request cost one credit, served or not
    for peer in &requesters {
        assert_eq!(peer.accounting.balance(), 1);
    }
}

#[tokio::test]
async fn expired_requesters_skipped_silently() {
    let requesters: Vec<_> = (1..=4).map(TestPeer::new).collect();
    let hive = TestHive::of(&[]);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"late");
    let key = *chunk.address();

    let mut expired = retrieve_req(key, 7);
    expired.timeout = Some(Instant::now() - Duration::from_secs(1));
    store.add_retrieve_request(expired, requesters[0].clone());
    for peer in &requesters[1..] {
        store.add_retrieve_request(retrieve_req(key, 7), peer.clone());
    }

    store.put(chunk);

    assert!(requesters[0].sent(DeliveryKind::Deliver).is_empty());
    for peer in &requesters[1..] {
        assert_eq!(peer.sent(DeliveryKind::Deliver).len(), 1);
    }
}

#[tokio::test]
async fn propagation_suppresses_source() {
    let peers = [TestPeer::new(1), TestPeer::new(2), TestPeer::new(3)];
    let hive = TestHive::of(&peers);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"replicate me");

    store.add_store_request(
        StoreRequest {
            key: *chunk.address(),
            id: 1,
            data: chunk.data().clone(),
            request_timeout: None,
        },
        peers[0].clone(),
    );

    wait_until(|| {
        peers[1..]
            .iter()
            .all(|p| !p.sent(DeliveryKind::Propagate).is_empty())
    })
    .await;
    assert!(peers[0].sent(DeliveryKind::Propagate).is_empty());
}

#[tokio::test]
async fn local_put_propagates_to_neighbourhood() {
    let peers = [TestPeer::new(1), TestPeer::new(2)];
    let hive = TestHive::of(&peers);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"fresh");
    store.put(chunk.clone());

    wait_until(|| {
        peers
            .iter()
            .all(|p| !p.sent(DeliveryKind::Propagate).is_empty())
    })
    .await;
    for peer in &peers {
        let sent = peer.sent(DeliveryKind::Propagate);
        assert_eq!(sent[0].key, *chunk.address());
        assert_eq!(sent[0].data, *chunk.data());
    }
}

#[tokio::test]
async fn served_retrieve_charges_and_answers_with_peers() {
    let requester = TestPeer::new(9);
    let neighbours = [TestPeer::new(1), TestPeer::new(2)];
    let hive = TestHive::of(&neighbours);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"available");
    store.local().put(&chunk).unwrap();

    store.add_retrieve_request(retrieve_req(*chunk.address(), 5), requester.clone());

    let deliveries = requester.sent(DeliveryKind::Deliver);
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].id, 5);
    assert_eq!(deliveries[0].data, *chunk.data());
    assert_eq!(requester.accounting.balance(), 1);

    // routing hints go out even after a successful delivery
    let hints = requester.peers_msgs();
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0].key, Some(*chunk.address()));
    assert_eq!(hints[0].id, 5);
    assert_eq!(hints[0].peers.len(), 2);
}

#[tokio::test]
async fn oversized_chunk_not_delivered() {
    let requester = TestPeer::new(9);
    let hive = TestHive::of(&[]);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(&[0u8; 100]);
    store.local().put(&chunk).unwrap();

    let mut req = retrieve_req(*chunk.address(), 6);
    req.max_size = 10;
    store.add_retrieve_request(req, requester.clone());

    assert!(requester.sent(DeliveryKind::Deliver).is_empty());
    assert_eq!(requester.accounting.balance(), 1);
    assert_eq!(requester.peers_msgs().len(), 1);
}

#[tokio::test]
async fn unpayable_request_is_dropped() {
    let requester = TestPeer::new(9);
    requester.accounting.fail.store(true, Ordering::SeqCst);
    let hive = TestHive::of(&[]);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"paywalled");
    store.local().put(&chunk).unwrap();

    store.add_retrieve_request(retrieve_req(*chunk.address(), 8), requester.clone());

    assert!(requester.sent(DeliveryKind::Deliver).is_empty());
    assert!(requester.peers_msgs().is_empty());
}

#[tokio::test]
async fn self_lookup_answers_with_peers_only() {
    let requester = TestPeer::new(9);
    let neighbours = [TestPeer::new(1), TestPeer::new(2), TestPeer::new(3)];
    let hive = TestHive::of(&neighbours);
    let store = netstore(hive);

    let mut req = retrieve_req(ChunkAddress::ZERO, 11);
    req.max_peers = 2;
    store.add_retrieve_request(req, requester.clone());

    let hints = requester.peers_msgs();
    assert_eq!(hints.len(), 1);
    assert_eq!(hints[0].key, None);
    assert_eq!(hints[0].id, 11);
    assert_eq!(hints[0].peers.len(), 2);

    // lookups are not metered
    assert_eq!(requester.accounting.balance(), 0);
}

#[tokio::test]
async fn search_skips_peers_that_requested_the_chunk() {
    let peer = TestPeer::new(1);
    let hive = TestHive::of(&[peer.clone()]);
    let store = netstore(hive);

    let key = *Chunk::from_payload(b"wanted").address();
    store.add_retrieve_request(retrieve_req(key, 3), peer.clone());

    // the only candidate is the requester itself: nothing to forward to
    assert!(peer.retrieves().is_empty());
    assert_eq!(peer.accounting.balance(), 1);
}

#[tokio::test]
async fn search_tries_next_peer_when_charge_fails() {
    let broke = TestPeer::new(1);
    broke.accounting.fail.store(true, Ordering::SeqCst);
    let solvent = TestPeer::new(2);
    let hive = TestHive::of(&[broke.clone(), solvent.clone()]);
    let store = netstore(hive);

    let key = *Chunk::from_payload(b"elsewhere").address();
    let getter = {
        let store = Arc::clone(&store);
        tokio::spawn(async move { store.get(key).await })
    };

    wait_until(|| !solvent.retrieves().is_empty()).await;
    assert!(broke.retrieves().is_empty());
    assert_eq!(solvent.accounting.balance(), -1);

    let _ = getter.await.unwrap();
}

#[tokio::test]
async fn disconnected_requester_does_not_block_delivery() {
    let gone = TestPeer::new(1);
    let alive = TestPeer::new(2);
    let hive = TestHive::of(&[]);
    let store = netstore(hive);

    let chunk = Chunk::from_payload(b"resilient");
    let key = *chunk.address();

    store.add_retrieve_request(retrieve_req(key, 13), gone.clone());
    store.add_retrieve_request(retrieve_req(key, 13), alive.clone());
    gone.disconnected.store(true, Ordering::SeqCst);

    store.put(chunk);

    assert_eq!(alive.sent(DeliveryKind::Deliver).len(), 1);
}

#[tokio::test]
async fn redb_backed_store_serves_evicted_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let mut params = StoreParams::new(dir.path());
    params.cache_capacity = 2;

    let db = apiary_storer::RedbChunkStore::open(&params.chunk_db_path).unwrap();
    let local = LocalStore::new(db, &params).unwrap();
    let store = Arc::new(NetStore::with_config(
        local,
        TestHive::of(&[]),
        NetStoreConfig {
            search_timeout: SEARCH_TIMEOUT,
        },
    ));

    let chunk = Chunk::from_payload(b"durable");
    store.put(chunk.clone());

    // push the chunk out of the memory tier
    for n in 0u8..3 {
        store.local().put(&Chunk::from_payload(&[n; 4])).unwrap();
    }

    assert_eq!(store.get(*chunk.address()).await.unwrap(), chunk);
}
