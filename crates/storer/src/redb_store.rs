//! redb-backed chunk storage.

use std::path::Path;

use apiary_primitives::ChunkAddress;
use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use crate::{ChunkStore, StorerResult};

/// Key: 32-byte chunk address. Value: span-prefixed chunk bytes.
const CHUNKS_TABLE: TableDefinition<&[u8; 32], &[u8]> = TableDefinition::new("chunks");

/// Persistent chunk store backed by the redb embedded database.
///
/// ACID per operation; safe for concurrent readers and writers.
pub struct RedbChunkStore {
    db: Database,
}

impl RedbChunkStore {
    /// Open or create a chunk database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorerResult<Self> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CHUNKS_TABLE)?;
        }
        write_txn.commit()?;

        debug!("opened chunk database");
        Ok(Self { db })
    }
}

impl ChunkStore for RedbChunkStore {
    fn put(&self, address: &ChunkAddress, data: &[u8]) -> StorerResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CHUNKS_TABLE)?;
            let key: &[u8; 32] = address.as_ref();
            // content-addressed: an existing entry is already correct
            if table.get(key)?.is_none() {
                table.insert(key, data)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn get(&self, address: &ChunkAddress) -> StorerResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHUNKS_TABLE)?;
        let key: &[u8; 32] = address.as_ref();
        Ok(table.get(key)?.map(|value| value.value().to_vec()))
    }

    fn contains(&self, address: &ChunkAddress) -> StorerResult<bool> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHUNKS_TABLE)?;
        let key: &[u8; 32] = address.as_ref();
        Ok(table.get(key)?.is_some())
    }

    fn delete(&self, address: &ChunkAddress) -> StorerResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CHUNKS_TABLE)?;
            let key: &[u8; 32] = address.as_ref();
            table.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn count(&self) -> StorerResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHUNKS_TABLE)?;
        let mut count = 0u64;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn for_each<F>(&self, mut callback: F) -> StorerResult<()>
    where
        F: FnMut(&ChunkAddress) -> bool,
    {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHUNKS_TABLE)?;

        for entry in table.iter()? {
            let (key, _) = entry?;
            let address = ChunkAddress::new(*key.value());
            if !callback(&address) {
                break;
            }
        }

        Ok(())
    }
}
