//! Application layer.
//!
//! Ports describe what the services need from the outside world; services
//! hold the resolution and snapshot logic on top of them.

pub mod ports;
pub mod services;
