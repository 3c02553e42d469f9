//! Two-tier local chunk store.

use apiary_primitives::{Chunk, ChunkAddress};
use tracing::{debug, trace};

use crate::{CacheStats, ChunkStore, MemStore, Reserve, StoreParams, StorerResult};

/// Local chunk storage: memory tier over a persistent backend.
///
/// `get` consults the memory tier first and promotes persistent hits into
/// it; `put` inserts into the memory tier unconditionally and persists the
/// bytes. The persistent tier is bounded by a [`Reserve`] and collects old
/// entries when full. Every operation is atomic from the caller's view; the
/// store never holds placeholders, only data-bearing chunks.
pub struct LocalStore<S: ChunkStore> {
    db: S,
    mem: MemStore,
    reserve: Reserve,
}

impl<S: ChunkStore> LocalStore<S> {
    /// Create a local store over `db` with the given parameters.
    ///
    /// The reserve counter is initialized by scanning the backend.
    pub fn new(db: S, params: &StoreParams) -> StorerResult<Self> {
        let reserve = Reserve::new(params.db_capacity);
        reserve.initialize_from(&db)?;
        Ok(Self {
            db,
            mem: MemStore::new(params.cache_capacity),
            reserve,
        })
    }

    /// Get a chunk by address.
    pub fn get(&self, address: &ChunkAddress) -> StorerResult<Option<Chunk>> {
        if let Some(chunk) = self.mem.get(address) {
            trace!(%address, "memory hit");
            return Ok(Some(chunk));
        }

        match self.db.get(address)? {
            Some(bytes) => {
                // bytes on disk are trusted only after re-validation
                let chunk = Chunk::with_address(*address, bytes)?;
                self.mem.put(chunk.clone());
                trace!(%address, "promoted from persistent tier");
                Ok(Some(chunk))
            }
            None => Ok(None),
        }
    }

    /// Store a chunk in both tiers.
    pub fn put(&self, chunk: &Chunk) -> StorerResult<()> {
        self.mem.put(chunk.clone());

        if self.db.contains(chunk.address())? {
            trace!(address = %chunk.address(), "already persisted");
            return Ok(());
        }

        self.reserve.try_reserve(&self.db)?;
        self.db.put(chunk.address(), chunk.data())?;
        self.reserve.on_added();

        debug!(address = %chunk.address(), size = chunk.span(), "stored chunk");
        Ok(())
    }

    /// Whether the address is present in either tier.
    pub fn has(&self, address: &ChunkAddress) -> bool {
        self.mem.contains(address) || self.db.contains(address).unwrap_or(false)
    }

    /// Remove a chunk from both tiers.
    pub fn remove(&self, address: &ChunkAddress) -> StorerResult<()> {
        self.mem.remove(address);
        if self.db.contains(address)? {
            self.db.delete(address)?;
            self.reserve.on_removed();
        }
        debug!(%address, "removed chunk");
        Ok(())
    }

    /// The persistent-tier reserve.
    pub fn reserve(&self) -> &Reserve {
        &self.reserve
    }

    /// Memory-tier statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.mem.stats()
    }
}
