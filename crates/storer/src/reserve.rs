//! Persistent-tier capacity tracking.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::{ChunkStore, StorerError, StorerResult};

/// Capacity tracker for the persistent chunk store.
///
/// Counts entries rather than bytes; chunks are fixed-unit. When the store
/// is full, [`Reserve::try_reserve`] frees one slot by deleting the first
/// chunk the backend iterates, so the store behaves as a bounded cache
/// rather than refusing writes.
pub struct Reserve {
    capacity: u64,
    count: AtomicU64,
}

impl Reserve {
    /// Create a reserve with the given entry capacity.
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            count: AtomicU64::new(0),
        }
    }

    /// Initialize the count by scanning an existing store.
    pub fn initialize_from<S: ChunkStore>(&self, store: &S) -> StorerResult<()> {
        let count = store.count()?;
        self.count.store(count, Ordering::Relaxed);
        debug!(count, capacity = self.capacity, "reserve initialized");
        Ok(())
    }

    /// The configured capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The current entry count.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Whether a new entry fits without collecting.
    pub fn has_room(&self) -> bool {
        self.count() < self.capacity
    }

    /// Make room for one new entry, collecting an old one if needed.
    pub fn try_reserve<S: ChunkStore>(&self, store: &S) -> StorerResult<()> {
        if self.has_room() {
            return Ok(());
        }

        let mut victim = None;
        store.for_each(|addr| {
            victim = Some(*addr);
            false
        })?;

        match victim {
            Some(addr) => {
                debug!(%addr, "collecting chunk to stay under capacity");
                store.delete(&addr)?;
                self.on_removed();
                Ok(())
            }
            // full per the counter, yet nothing to collect
            None => Err(StorerError::StorageFull {
                capacity: self.capacity,
                used: self.count(),
            }),
        }
    }

    /// Record that an entry was added.
    pub fn on_added(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that an entry was removed.
    pub fn on_removed(&self) {
        let _ = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| {
                Some(c.saturating_sub(1))
            });
    }
}
