//! Infrastructure layer.
//!
//! - `config`: YAML configuration with environment interpolation
//! - `memory`: in-process adapters for the ports (tests, replay, dry runs)
//! - `records`: JSON Lines input and CSV export for the validator
//! - `metrics`: Prometheus counters
//! - `telemetry`: tracing subscriber setup

pub mod config;
pub mod memory;
pub mod metrics;
pub mod records;
pub mod telemetry;
