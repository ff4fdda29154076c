//! Clock Port (Driven Port)

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
///
/// Injected so cache expiry and rollover checks can run on a simulated
/// clock.
pub trait ClockPort: Send + Sync {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}
