//! Storer error types.

/// Errors from storer operations.
#[derive(Debug, thiserror::Error)]
pub enum StorerError {
    /// Database error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage full.
    #[error("storage full: capacity {capacity}, used {used}")]
    StorageFull {
        /// Configured capacity in chunks.
        capacity: u64,
        /// Chunks currently stored.
        used: u64,
    },

    /// Persisted bytes failed chunk validation.
    #[error("invalid chunk: {0}")]
    InvalidChunk(#[from] apiary_primitives::ChunkError),

    /// IO error.
    #[error("io error: {0}")]
    Io(String),
}

impl From<redb::DatabaseError> for StorerError {
    fn from(err: redb::DatabaseError) -> Self {
        StorerError::Database(err.to_string())
    }
}

impl From<redb::TransactionError> for StorerError {
    fn from(err: redb::TransactionError) -> Self {
        StorerError::Database(err.to_string())
    }
}

impl From<redb::TableError> for StorerError {
    fn from(err: redb::TableError) -> Self {
        StorerError::Database(err.to_string())
    }
}

impl From<redb::StorageError> for StorerError {
    fn from(err: redb::StorageError) -> Self {
        StorerError::Database(err.to_string())
    }
}

impl From<redb::CommitError> for StorerError {
    fn from(err: redb::CommitError) -> Self {
        StorerError::Database(err.to_string())
    }
}
