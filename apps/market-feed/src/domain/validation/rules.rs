//! Anomaly rules and the rows they produce.

use std::fmt;

use serde::{Serialize, Serializer};

/// How bad an anomaly is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Suspicious; data may still be usable.
    Warning,
    /// Internally inconsistent data.
    Error,
}

impl Severity {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A consistency rule a record can violate.
///
/// The `Display` form is the rule name used as the key in report counts,
/// e.g. `band_inversion[level=1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AnomalyRule {
    /// Upper band below lower band at a level.
    BandInversion {
        /// Band level, 1 innermost.
        level: u8,
    },
    /// Band at `level` is inside the band one level further in.
    BandOrder {
        /// The outer of the two levels compared.
        level: u8,
    },
    /// VWAP outside its first band.
    VwapOutsideBand,
    /// Value area not ordered `high >= poc >= low`.
    OrderViolation,
    /// A bucket lacks one or more of its correlated sub-blocks.
    IncompleteBucket,
    /// Bar high/low do not bracket open and close.
    BarRange,
    /// Bar volume below zero.
    NegativeVolume,
    /// Quote bid above ask.
    BidAskInverted,
    /// Trade price or quantity not positive.
    NonPositiveTrade,
    /// Depth level with negative size.
    NegativeDepthSize,
    /// Best bid above best ask in one depth record.
    CrossedBook,
    /// Timestamp went backwards within a `(type, symbol)` stream.
    TimestampRegression,
    /// Sequence index went backwards within a `(type, symbol)` stream.
    IndexRegression,
    /// Same `(type, symbol, timestamp, index)` seen twice.
    DuplicateKey,
    /// Producer sequence jumped forward by more than the configured gap.
    SequenceGap,
    /// Number-bars total differs from ask plus bid beyond tolerance.
    NbcvTotalMismatch,
    /// Number-bars delta differs from ask minus bid beyond tolerance.
    NbcvDeltaMismatch,
    /// Volatility index print outside the configured range.
    VixOutOfRange,
}

impl AnomalyRule {
    /// Default severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::BandInversion { .. }
            | Self::OrderViolation
            | Self::BarRange
            | Self::NegativeVolume
            | Self::BidAskInverted
            | Self::NonPositiveTrade
            | Self::NegativeDepthSize
            | Self::NbcvTotalMismatch
            | Self::NbcvDeltaMismatch => Severity::Error,
            Self::BandOrder { .. }
            | Self::VwapOutsideBand
            | Self::IncompleteBucket
            | Self::CrossedBook
            | Self::TimestampRegression
            | Self::IndexRegression
            | Self::DuplicateKey
            | Self::SequenceGap
            | Self::VixOutOfRange => Severity::Warning,
        }
    }
}

impl fmt::Display for AnomalyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BandInversion { level } => write!(f, "band_inversion[level={level}]"),
            Self::BandOrder { level } => write!(f, "band_order[level={level}]"),
            Self::VwapOutsideBand => f.write_str("vwap_outside_band"),
            Self::OrderViolation => f.write_str("order_violation"),
            Self::IncompleteBucket => f.write_str("incomplete_bucket"),
            Self::BarRange => f.write_str("bar_range"),
            Self::NegativeVolume => f.write_str("negative_volume"),
            Self::BidAskInverted => f.write_str("bid_ask_inverted"),
            Self::NonPositiveTrade => f.write_str("non_positive_trade"),
            Self::NegativeDepthSize => f.write_str("negative_depth_size"),
            Self::CrossedBook => f.write_str("crossed_book"),
            Self::TimestampRegression => f.write_str("timestamp_regression"),
            Self::IndexRegression => f.write_str("index_regression"),
            Self::DuplicateKey => f.write_str("duplicate_key"),
            Self::SequenceGap => f.write_str("sequence_gap"),
            Self::NbcvTotalMismatch => f.write_str("nbcv_total_mismatch"),
            Self::NbcvDeltaMismatch => f.write_str("nbcv_delta_mismatch"),
            Self::VixOutOfRange => f.write_str("vix_out_of_range"),
        }
    }
}

impl Serialize for AnomalyRule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One flagged record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    /// Ordinal of the record among successfully parsed records (0-based).
    pub record: usize,
    /// Record type as written.
    pub kind: String,
    /// Record timestamp, epoch seconds.
    pub timestamp: f64,
    /// Record symbol, if any.
    pub symbol: Option<String>,
    /// Violated rule.
    pub rule: AnomalyRule,
    /// Severity.
    pub severity: Severity,
    /// Human-readable detail.
    pub detail: String,
}
