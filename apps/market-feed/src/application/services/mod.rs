//! Application Services
//!
//! - `contract_resolver`: front-month resolution with TTL and rollover-aware caching
//! - `snapshot_client`: bounded snapshot reads over a streaming subscription

mod contract_resolver;
mod snapshot_client;

pub use contract_resolver::{
    ContractResolver, DEFAULT_CACHE_TTL, DEFAULT_EXCHANGE, DEFAULT_ROLLOVER_DAYS, ResolveError,
    ResolverConfig, select_front_month,
};
pub use snapshot_client::{
    DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL, SnapshotClient, SnapshotRequest,
};
