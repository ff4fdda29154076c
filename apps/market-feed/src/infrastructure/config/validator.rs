//! Validator settings.

use serde::{Deserialize, Serialize};

use crate::domain::validation::{
    DEFAULT_MAX_DETAIL_ROWS, DEFAULT_MAX_SEQUENCE_GAP, DEFAULT_NBCV_TOLERANCE_PCT,
    DEFAULT_VIX_RANGE, ValidatorConfig,
};

/// Validator settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatorSettings {
    /// Maximum non-blank lines read into a window; 0 reads everything.
    #[serde(default)]
    pub max_records: usize,
    /// Cap on row-level anomaly detail.
    #[serde(default = "default_max_detail_rows")]
    pub max_detail_rows: usize,
    /// Whether row-level detail is reported at all.
    #[serde(default = "default_true")]
    pub include_details: bool,
    /// Largest forward jump in a stream's producer sequence.
    #[serde(default = "default_max_sequence_gap")]
    pub max_sequence_gap: u64,
    /// Number-bars `total` tolerance, in percent.
    #[serde(default = "default_nbcv_tolerance_pct")]
    pub nbcv_total_tolerance_pct: f64,
    /// Number-bars `delta` tolerance, in percent.
    #[serde(default = "default_nbcv_tolerance_pct")]
    pub nbcv_delta_tolerance_pct: f64,
    /// Lowest accepted volatility index value.
    #[serde(default = "default_vix_min")]
    pub vix_min: f64,
    /// Highest accepted volatility index value.
    #[serde(default = "default_vix_max")]
    pub vix_max: f64,
}

impl Default for ValidatorSettings {
    fn default() -> Self {
        Self {
            max_records: 0,
            max_detail_rows: default_max_detail_rows(),
            include_details: true,
            max_sequence_gap: DEFAULT_MAX_SEQUENCE_GAP,
            nbcv_total_tolerance_pct: DEFAULT_NBCV_TOLERANCE_PCT,
            nbcv_delta_tolerance_pct: DEFAULT_NBCV_TOLERANCE_PCT,
            vix_min: DEFAULT_VIX_RANGE.0,
            vix_max: DEFAULT_VIX_RANGE.1,
        }
    }
}

impl ValidatorSettings {
    /// Convert to the validator configuration.
    #[must_use]
    pub fn to_validator_config(&self) -> ValidatorConfig {
        ValidatorConfig::default()
            .with_details(self.include_details)
            .with_max_detail_rows(self.max_detail_rows)
            .with_max_sequence_gap(self.max_sequence_gap)
            .with_nbcv_tolerance(self.nbcv_total_tolerance_pct, self.nbcv_delta_tolerance_pct)
            .with_vix_range(self.vix_min, self.vix_max)
    }

    /// Window bound, `None` when unbounded.
    #[must_use]
    pub const fn max_records(&self) -> Option<usize> {
        if self.max_records == 0 {
            None
        } else {
            Some(self.max_records)
        }
    }
}

const fn default_max_detail_rows() -> usize {
    DEFAULT_MAX_DETAIL_ROWS
}

const fn default_true() -> bool {
    true
}

const fn default_max_sequence_gap() -> u64 {
    DEFAULT_MAX_SEQUENCE_GAP
}

const fn default_nbcv_tolerance_pct() -> f64 {
    DEFAULT_NBCV_TOLERANCE_PCT
}

const fn default_vix_min() -> f64 {
    DEFAULT_VIX_RANGE.0
}

const fn default_vix_max() -> f64 {
    DEFAULT_VIX_RANGE.1
}
