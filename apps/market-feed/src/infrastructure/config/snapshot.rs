//! Snapshot client settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::services::SnapshotRequest;

/// Snapshot client settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSettings {
    /// Upper bound on a snapshot wait, in milliseconds.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Delay between buffer reads, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            max_wait_ms: default_max_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl SnapshotSettings {
    /// Convert to a snapshot request.
    #[must_use]
    pub const fn to_snapshot_request(&self) -> SnapshotRequest {
        SnapshotRequest::new(
            Duration::from_millis(self.max_wait_ms),
            Duration::from_millis(self.poll_interval_ms),
        )
    }
}

const fn default_max_wait_ms() -> u64 {
    6_000
}

const fn default_poll_interval_ms() -> u64 {
    100
}
