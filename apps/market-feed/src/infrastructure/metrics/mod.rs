//! Prometheus Metrics Module
//!
//! # Metrics
//!
//! - `market_feed_contract_resolutions_total{outcome}`: cache hits, refreshes,
//!   and failures
//! - `market_feed_snapshots_total{mode}`: snapshot outcomes
//! - `market_feed_subscriptions_superseded_total`
//! - `market_feed_records_skipped_total`
//! - `market_feed_anomalies_total{rule}`
//!
//! Recording goes through the `metrics` facade and is a no-op until
//! [`init_metrics`] installs the Prometheus recorder.

use std::sync::OnceLock;

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::snapshot::SnapshotMode;
use crate::domain::validation::ValidationReport;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder and register metric descriptions.
///
/// Later calls return the handle installed by the first one.
///
/// # Errors
///
/// Returns `BuildError` if another recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "market_feed_contract_resolutions_total",
        "Contract resolutions by outcome"
    );
    describe_counter!(
        "market_feed_snapshots_total",
        "Snapshot calls by returned mode"
    );
    describe_counter!(
        "market_feed_subscriptions_superseded_total",
        "Subscriptions superseded after a contract change"
    );
    describe_counter!(
        "market_feed_records_skipped_total",
        "Persisted records skipped as malformed"
    );
    describe_counter!(
        "market_feed_anomalies_total",
        "Validator anomalies by rule"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Outcome label for contract resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Served from cache.
    Hit,
    /// Looked up and cached.
    Refresh,
    /// Lookup returned nothing usable.
    NotFound,
    /// Lookup failed.
    Failed,
}

impl ResolutionOutcome {
    /// Get the label string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Refresh => "refresh",
            Self::NotFound => "not_found",
            Self::Failed => "failed",
        }
    }
}

/// Record a contract resolution.
pub fn record_contract_resolution(outcome: ResolutionOutcome) {
    counter!("market_feed_contract_resolutions_total", "outcome" => outcome.as_str()).increment(1);
}

/// Record a snapshot outcome.
pub fn record_snapshot(mode: SnapshotMode) {
    counter!("market_feed_snapshots_total", "mode" => mode.as_str()).increment(1);
}

/// Record a superseded subscription.
pub fn record_subscription_superseded() {
    counter!("market_feed_subscriptions_superseded_total").increment(1);
}

/// Record the counts of a finished validation pass.
pub fn record_validation(report: &ValidationReport) {
    counter!("market_feed_records_skipped_total").increment(report.skipped_count as u64);
    for (rule, count) in &report.anomaly_counts {
        counter!("market_feed_anomalies_total", "rule" => rule.clone()).increment(*count as u64);
    }
}
