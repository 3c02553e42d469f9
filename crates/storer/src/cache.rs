//! LRU memory tier for hot chunks.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use apiary_primitives::{Chunk, ChunkAddress};
use lru::LruCache;
use parking_lot::Mutex;

/// Bounded in-memory chunk cache.
///
/// Holds whole chunks; payloads are shared, so hits are cheap. Eviction is
/// least-recently-used.
pub struct MemStore {
    cache: Mutex<LruCache<ChunkAddress, Chunk>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemStore {
    /// Create a cache holding up to `capacity` chunks.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(cap)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a chunk, refreshing its recency.
    pub fn get(&self, address: &ChunkAddress) -> Option<Chunk> {
        let mut cache = self.cache.lock();
        match cache.get(address) {
            Some(chunk) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(chunk.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert a chunk, possibly evicting the least recently used one.
    pub fn put(&self, chunk: Chunk) {
        self.cache.lock().put(*chunk.address(), chunk);
    }

    /// Drop a chunk from the cache.
    pub fn remove(&self, address: &ChunkAddress) {
        self.cache.lock().pop(address);
    }

    /// Whether the address is cached. Does not refresh recency.
    pub fn contains(&self, address: &ChunkAddress) -> bool {
        self.cache.lock().contains(address)
    }

    /// Number of cached chunks.
    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hit/miss statistics since creation.
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let cache = self.cache.lock();
        CacheStats {
            capacity: cache.cap().get(),
            size: cache.len(),
            hits,
            misses,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Maximum cache capacity.
    pub capacity: usize,
    /// Current cache size.
    pub size: usize,
    /// Cache hits.
    pub hits: u64,
    /// Cache misses.
    pub misses: u64,
}
