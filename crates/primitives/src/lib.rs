//! Commonly used types in apiary.
//!
//! This crate contains the primitive types shared by every other crate in
//! the workspace: content-addressed chunks and the XOR distance metric over
//! the 32-byte address space.

pub mod chunk;
pub mod distance;
pub mod proximity;

pub use chunk::{Chunk, ChunkError, SPAN_SIZE};
pub use distance::{distance, distance_cmp, Distance};
pub use proximity::proximity;

// Re-exports from alloy-primitives to ensure consistent usage
pub use alloy_primitives::{keccak256, B256, U256};

/// Number of bytes in a chunk or overlay address.
pub const HASH_SIZE: usize = 32;

/// Maximum proximity order over the address space.
pub const MAX_PO: u8 = 31;

/// 32-byte content hash addressing a chunk.
///
/// The distinguished zero address never names content; a retrieve request
/// carrying it is a self-lookup for the requester's own neighbourhood.
pub type ChunkAddress = B256;

/// 32-byte overlay address of a peer, in the same metric space as
/// [`ChunkAddress`] so chunks and peers can be compared for distance.
pub type OverlayAddress = B256;
