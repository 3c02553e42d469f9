//! The network chunk store.
//!
//! [`NetStore`] is the entrypoint for chunk store and retrieve requests,
//! both local and arriving from peers, so it runs heavily parallelised. It
//! unifies the two-tier [`LocalStore`](apiary_storer::LocalStore) with
//! on-demand retrieval over the routing overlay: concurrent requests for
//! one chunk coalesce on a [`RequestTable`] entry, lookups are forwarded to
//! the closest peers the [`Hive`](apiary_api::Hive) knows, and arriving
//! data is validated, stored and fanned out to the waiting requesters.

mod config;
mod error;
mod hive;
mod ids;
mod request;
mod store;

pub use config::{NetStoreConfig, DEFAULT_SEARCH_TIMEOUT};
pub use error::NetStoreError;
pub use hive::{PeerRegistry, DEFAULT_MAX_PEERS};
pub use ids::RequestIds;
pub use request::{RequestStatus, RequestTable, Requester, SearchState};
pub use store::{NetStore, REQUESTER_COUNT};

/// Result alias for netstore operations.
pub type NetStoreResult<T> = Result<T, NetStoreError>;
