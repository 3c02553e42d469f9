//! Chunk storage backend trait.
//!
//! [`ChunkStore`] is the low-level key-to-bytes interface for chunk
//! persistence. Backends must be thread-safe; callers treat every
//! operation as atomic.

use apiary_primitives::ChunkAddress;

use crate::StorerResult;

/// Chunk storage backend.
///
/// Stores raw span-prefixed chunk bytes under their content address.
#[auto_impl::auto_impl(&, Arc)]
pub trait ChunkStore: Send + Sync {
    /// Store chunk bytes. A no-op if the address already exists.
    fn put(&self, address: &ChunkAddress, data: &[u8]) -> StorerResult<()>;

    /// Get chunk bytes, or `None` if absent.
    fn get(&self, address: &ChunkAddress) -> StorerResult<Option<Vec<u8>>>;

    /// Check whether an address is present.
    fn contains(&self, address: &ChunkAddress) -> StorerResult<bool>;

    /// Remove an address. `Ok(())` even if it was absent.
    fn delete(&self, address: &ChunkAddress) -> StorerResult<()>;

    /// Number of chunks stored.
    fn count(&self) -> StorerResult<u64>;

    /// Iterate over stored addresses. Return `false` from the callback to
    /// stop.
    fn for_each<F>(&self, callback: F) -> StorerResult<()>
    where
        F: FnMut(&ChunkAddress) -> bool;
}

/// In-memory chunk store, for tests and ephemeral nodes.
#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: parking_lot::RwLock<std::collections::HashMap<ChunkAddress, Vec<u8>>>,
}

impl MemoryChunkStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChunkStore for MemoryChunkStore {
    fn put(&self, address: &ChunkAddress, data: &[u8]) -> StorerResult<()> {
        let mut chunks = self.chunks.write();
        chunks.entry(*address).or_insert_with(|| data.to_vec());
        Ok(())
    }

    fn get(&self, address: &ChunkAddress) -> StorerResult<Option<Vec<u8>>> {
        Ok(self.chunks.read().get(address).cloned())
    }

    fn contains(&self, address: &ChunkAddress) -> StorerResult<bool> {
        Ok(self.chunks.read().contains_key(address))
    }

    fn delete(&self, address: &ChunkAddress) -> StorerResult<()> {
        self.chunks.write().remove(address);
        Ok(())
    }

    fn count(&self) -> StorerResult<u64> {
        Ok(self.chunks.read().len() as u64)
    }

    fn for_each<F>(&self, mut callback: F) -> StorerResult<()>
    where
        F: FnMut(&ChunkAddress) -> bool,
    {
        for address in self.chunks.read().keys() {
            if !callback(address) {
                break;
            }
        }
        Ok(())
    }
}
