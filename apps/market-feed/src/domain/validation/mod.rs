//! Multi-stream record validation.
//!
//! Rules live in [`rules`], the report shape in [`report`], and the
//! single-pass walk in [`validator`].

pub mod report;
pub mod rules;
pub mod validator;

pub use report::{DepthStats, TimeSpan, ValidationReport};
pub use rules::{AnomalyRecord, AnomalyRule, Severity};
pub use validator::{
    DEFAULT_MAX_DETAIL_ROWS, DEFAULT_MAX_SEQUENCE_GAP, DEFAULT_NBCV_TOLERANCE_PCT,
    DEFAULT_VIX_RANGE, MultiStreamValidator, RecordWindow, ValidatorConfig,
};
