//! Application Ports (Driven)
//!
//! Interfaces onto the broker session and the clock. The broker session is a
//! process-wide handle owned elsewhere; services only issue requests through
//! these traits and never connect or disconnect it.

mod clock_port;
mod contract_lookup_port;
mod market_data_port;

pub use clock_port::ClockPort;
pub use contract_lookup_port::{ContractCandidate, ContractLookupError, ContractLookupPort};
pub use market_data_port::{MarketDataError, MarketDataPort, QuoteBuffer};
