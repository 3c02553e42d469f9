//! Content-addressed chunks.
//!
//! A [`Chunk`] is a fixed-unit payload addressed by the keccak256 hash of
//! its bytes. The first [`SPAN_SIZE`] bytes of the payload encode the stored
//! size little-endian; the remainder is chunk content.

use bytes::Bytes;

use crate::{keccak256, ChunkAddress};

/// Number of prefix bytes encoding the span (stored size) little-endian.
pub const SPAN_SIZE: usize = 8;

/// Errors constructing a chunk from raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    /// Data is shorter than the span prefix.
    #[error("chunk data too short: {len} bytes, need at least {SPAN_SIZE}")]
    TooShort {
        /// Length of the offered data.
        len: usize,
    },

    /// Data does not hash to the claimed address.
    #[error("chunk data does not hash to {expected}")]
    AddressMismatch {
        /// The address the data was claimed to live under.
        expected: ChunkAddress,
    },
}

/// A content-addressed chunk.
///
/// Invariant: `keccak256(data) == address` for every constructed chunk, and
/// `data` always carries the span prefix. Cloning is cheap; the payload is
/// shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    address: ChunkAddress,
    data: Bytes,
}

impl Chunk {
    /// Create a chunk from span-prefixed data, deriving its address.
    pub fn new(data: impl Into<Bytes>) -> Result<Self, ChunkError> {
        let data = data.into();
        if data.len() < SPAN_SIZE {
            return Err(ChunkError::TooShort { len: data.len() });
        }
        let address = keccak256(&data);
        Ok(Self { address, data })
    }

    /// Rebuild a chunk from bytes claimed to live under `address`.
    ///
    /// The hash is recomputed; mismatching data is rejected. This is the
    /// validation gate for every inbound store request and for bytes read
    /// back from disk.
    pub fn with_address(
        address: ChunkAddress,
        data: impl Into<Bytes>,
    ) -> Result<Self, ChunkError> {
        let data = data.into();
        if data.len() < SPAN_SIZE {
            return Err(ChunkError::TooShort { len: data.len() });
        }
        if keccak256(&data) != address {
            return Err(ChunkError::AddressMismatch { expected: address });
        }
        Ok(Self { address, data })
    }

    /// Frame `payload` with its span prefix and build the chunk.
    pub fn from_payload(payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(SPAN_SIZE + payload.len());
        data.extend_from_slice(&(payload.len() as u64).to_le_bytes());
        data.extend_from_slice(payload);
        let address = keccak256(&data);
        Self {
            address,
            data: data.into(),
        }
    }

    /// Whether `data` hashes to `address`.
    pub fn verify(address: &ChunkAddress, data: &[u8]) -> bool {
        keccak256(data) == *address
    }

    /// The content address.
    pub fn address(&self) -> &ChunkAddress {
        &self.address
    }

    /// The span-prefixed data.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The stored size, read from the little-endian span prefix.
    pub fn span(&self) -> u64 {
        let mut prefix = [0u8; SPAN_SIZE];
        prefix.copy_from_slice(&self.data[..SPAN_SIZE]);
        u64::from_le_bytes(prefix)
    }

    /// Consume the chunk, returning its data.
    pub fn into_data(self) -> Bytes {
        self.data
    }
}
