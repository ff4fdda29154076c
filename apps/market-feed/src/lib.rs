#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Market Feed - Futures Market-Data Acquisition and Validation
//!
//! Three independent pieces sit behind this crate:
//!
//! - **Contract resolution**: picks the front-month contract for a symbol,
//!   caching the answer per symbol until its TTL elapses or expiry gets close.
//! - **Snapshots**: keeps one subscription per symbol and turns the broker's
//!   push-updated quote buffer into a bounded `get_snapshot` call that always
//!   returns one of `live`, `timeout` or `no_contract`.
//! - **Validation**: a deterministic offline pass over persisted JSON Lines
//!   market-state records producing an anomaly report.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: contracts, snapshots, subscriptions, market records, and
//!   validation rules. No I/O.
//! - **Application**: ports for contract lookup, market data, and time;
//!   services for resolution and snapshots.
//! - **Infrastructure**: configuration, in-memory adapters, record reading
//!   and CSV export, metrics, and telemetry.
//!
//! # Data Flow
//!
//! ```text
//! caller ──► SnapshotClient ──► ContractResolver ──► ContractLookupPort
//!                 │
//!                 └──► MarketDataPort ──► QuoteBuffer (polled)
//!
//! operator ──► RecordWindow (JSONL) ──► MultiStreamValidator ──► ValidationReport
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Contracts, snapshots, records, and validation rules.
pub mod domain;

/// Application layer - Ports and services.
pub mod application;

/// Infrastructure layer - Adapters, configuration, and observability.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::contract::{
    ContractCacheEntry, ContractDescriptor, ExpiryKey, ExpiryKeyError, StaleReason,
};
pub use domain::records::{MalformedRecord, MarketRecord, RecordBody, RecordHeader};
pub use domain::snapshot::{RawQuote, Snapshot, SnapshotMode};
pub use domain::subscription::{Subscription, SubscriptionId};
pub use domain::validation::{
    AnomalyRecord, AnomalyRule, DepthStats, MultiStreamValidator, RecordWindow, Severity,
    TimeSpan, ValidationReport, ValidatorConfig,
};

// Ports
pub use application::ports::{
    ClockPort, ContractLookupError, ContractLookupPort, MarketDataError, MarketDataPort,
    QuoteBuffer,
};

// Services
pub use application::services::{
    ContractResolver, ResolveError, ResolverConfig, SnapshotClient, SnapshotRequest,
};

// Infrastructure
pub use infrastructure::config::{Config, ConfigError, load_config, load_config_from_string};
pub use infrastructure::memory::{
    InMemoryMarketData, ManualClock, SharedQuoteBuffer, StaticContractLookup, SystemClock,
};
pub use infrastructure::metrics::init_metrics;
pub use infrastructure::records::{ExportError, SourceError};
pub use infrastructure::telemetry::{TelemetryError, init as init_telemetry};
