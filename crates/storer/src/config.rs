//! Local storage configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Default persistent-tier capacity, in chunks.
pub const DEFAULT_DB_CAPACITY: u64 = 5_000_000;

/// Default memory-tier capacity, in chunks.
pub const DEFAULT_CACHE_CAPACITY: usize = 5_000;

/// Default storage radius; 0 stores everything regardless of proximity.
pub const DEFAULT_RADIUS: u8 = 0;

/// Parameters of the local chunk store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreParams {
    /// Path of the persistent chunk database.
    pub chunk_db_path: PathBuf,
    /// Persistent-tier capacity in chunks.
    pub db_capacity: u64,
    /// Memory-tier capacity in chunks.
    pub cache_capacity: usize,
    /// Proximity order below which chunks are not kept.
    pub radius: u8,
}

impl StoreParams {
    /// Parameters rooted at `path`, with the chunk database under
    /// `<path>/chunks`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            chunk_db_path: path.as_ref().join("chunks"),
            db_capacity: DEFAULT_DB_CAPACITY,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            radius: DEFAULT_RADIUS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_derived_from_root() {
        let params = StoreParams::new("/var/lib/apiary");
        assert_eq!(params.chunk_db_path, PathBuf::from("/var/lib/apiary/chunks"));
        assert_eq!(params.db_capacity, DEFAULT_DB_CAPACITY);
        assert_eq!(params.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }
}
