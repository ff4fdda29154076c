//! Validation report.
//!
//! Every map is ordered so that serializing the same report twice yields the
//! same bytes.

use std::collections::BTreeMap;

use serde::Serialize;

use super::rules::{AnomalyRecord, AnomalyRule, Severity};

/// Descriptive statistics over depth records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthStats {
    /// Depth records seen.
    pub records: usize,
    /// Mean of bid levels plus ask levels per record.
    pub mean_levels: f64,
    /// Maximum of bid levels plus ask levels per record.
    pub max_levels: usize,
}

/// Earliest and latest timestamp seen for one record type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeSpan {
    /// Earliest timestamp, epoch seconds.
    pub earliest: f64,
    /// Latest timestamp, epoch seconds.
    pub latest: f64,
}

impl TimeSpan {
    pub(crate) const fn at(timestamp: f64) -> Self {
        Self {
            earliest: timestamp,
            latest: timestamp,
        }
    }

    pub(crate) fn extend(&mut self, timestamp: f64) {
        if timestamp < self.earliest {
            self.earliest = timestamp;
        }
        if timestamp > self.latest {
            self.latest = timestamp;
        }
    }
}

/// Result of one validation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Records that parsed and were inspected.
    pub records_parsed: usize,
    /// Lines that could not be parsed.
    pub skipped_count: usize,
    /// Parsed records per type as written.
    pub records_by_type: BTreeMap<String, usize>,
    /// Anomalies per rule name.
    pub anomaly_counts: BTreeMap<String, usize>,
    /// Anomalies per severity.
    pub severity_counts: BTreeMap<Severity, usize>,
    /// Row-level detail, capped by configuration.
    pub anomalies: Vec<AnomalyRecord>,
    /// Whether `anomalies` was capped.
    pub details_truncated: bool,
    /// Depth statistics, absent when the window has no depth records.
    pub depth: Option<DepthStats>,
    /// Cluster occurrences per group key.
    pub cluster_counts: BTreeMap<String, usize>,
    /// Timestamp range per record type.
    pub time_spans: BTreeMap<String, TimeSpan>,
}

impl ValidationReport {
    /// Total anomalies across all rules.
    #[must_use]
    pub fn total_anomalies(&self) -> usize {
        self.anomaly_counts.values().sum()
    }

    /// Count for one rule.
    #[must_use]
    pub fn count(&self, rule: AnomalyRule) -> usize {
        self.anomaly_counts
            .get(&rule.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Detail rows for one rule.
    pub fn anomalies_for(&self, rule: AnomalyRule) -> impl Iterator<Item = &AnomalyRecord> {
        self.anomalies.iter().filter(move |a| a.rule == rule)
    }

    /// Whether no error-severity anomaly was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.severity_counts
            .get(&Severity::Error)
            .is_none_or(|&n| n == 0)
    }
}
