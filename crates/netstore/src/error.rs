//! NetStore error types.

use apiary_primitives::ChunkAddress;

/// Errors surfaced to local callers of the network store.
#[derive(Debug, thiserror::Error)]
pub enum NetStoreError {
    /// The chunk was not retrieved within the search timeout.
    #[error("chunk not found: {0}")]
    NotFound(ChunkAddress),

    /// The local storage layer failed.
    #[error(transparent)]
    Storage(#[from] apiary_storer::StorerError),
}
