//! Domain layer.
//!
//! Pure types and rules. Nothing in here performs I/O or reads the clock;
//! time is always passed in by the caller.

pub mod contract;
pub mod records;
pub mod snapshot;
pub mod subscription;
pub mod validation;
