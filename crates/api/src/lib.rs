//! Core API traits for the apiary chunk store
//!
//! This crate defines the boundaries between the chunk-routing store and its
//! collaborators: the peer session wire surface, the routing overlay and the
//! per-peer service accounting. Implementations live elsewhere; the store
//! orchestrates exclusively through these traits.

#![warn(missing_docs)]

/// Service accounting traits
pub mod accounting;
pub use accounting::*;

/// Wire message shapes
pub mod message;
pub use message::*;

/// Peer session traits
pub mod peer;
pub use peer::*;

/// Routing overlay traits
pub mod topology;
pub use topology::*;

// Re-export common primitives for convenience
pub use apiary_primitives::{Chunk, ChunkAddress, OverlayAddress};
