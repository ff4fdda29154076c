//! In-memory port adapters.
//!
//! Deterministic stand-ins for the broker session and the clock. Used by the
//! test suites and by replay tooling that drives the services without a live
//! connection.

mod clock;
mod contract_lookup;
mod market_data;

pub use clock::{ManualClock, SystemClock};
pub use contract_lookup::StaticContractLookup;
pub use market_data::{InMemoryMarketData, SharedQuoteBuffer};
