//! NetStore configuration.

use std::time::Duration;

/// Timeout for a network search before a local retrieve gives up.
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(3);

/// NetStore tuning knobs.
#[derive(Debug, Clone)]
pub struct NetStoreConfig {
    /// How long a local retrieve waits for the network, and the bound
    /// remote request deadlines are clamped to.
    pub search_timeout: Duration,
}

impl Default for NetStoreConfig {
    fn default() -> Self {
        Self {
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
        }
    }
}
