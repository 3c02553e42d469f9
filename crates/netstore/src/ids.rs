//! Retrieve request id generation.

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Process-wide source of retrieve request ids.
///
/// Ids only need to be unique among outstanding requests, so one seeded
/// generator behind a mutex is enough.
pub struct RequestIds {
    rng: Mutex<StdRng>,
}

impl RequestIds {
    /// Create a generator seeded from the OS.
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a deterministically seeded generator.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// The next request id.
    pub fn next(&self) -> u64 {
        self.rng.lock().gen()
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sequence_is_deterministic() {
        let a = RequestIds::with_seed(42);
        let b = RequestIds::with_seed(42);
        for _ in 0..8 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn test_ids_vary() {
        let ids = RequestIds::new();
        let first = ids.next();
        assert!((0..64).any(|_| ids.next() != first));
    }
}
