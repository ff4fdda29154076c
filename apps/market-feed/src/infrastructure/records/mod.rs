//! File-backed record input and CSV export.

mod export;
mod reader;

use std::path::PathBuf;

use thiserror::Error;

pub use export::{
    export_all, write_anomalies_csv, write_bars_csv, write_value_areas_csv, write_vwap_csv,
};

/// Hard failures reading a validator input.
///
/// Malformed lines are never reported here; they are counted in the window.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The input could not be opened.
    #[error("failed to open record source '{}': {source}", path.display())]
    Open {
        /// Input path.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// Reading failed part-way through.
    #[error("failed to read record source: {source}")]
    Read {
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Failures writing CSV exports.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization or write failure.
    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),
    /// Filesystem failure creating an export.
    #[error("export io failed: {0}")]
    Io(#[from] std::io::Error),
}
