//! CSV exports of a validated window.
//!
//! One table for anomalies, plus per-type tables for price bars, VWAP bands,
//! and value areas. Record ordinals match [`AnomalyRecord::record`].

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use super::ExportError;
use crate::domain::records::{MarketRecord, RecordBody};
use crate::domain::validation::{AnomalyRecord, RecordWindow, ValidationReport};

// =============================================================================
// Rows
// =============================================================================

#[derive(Serialize)]
struct AnomalyRow<'a> {
    record: usize,
    kind: &'a str,
    timestamp: f64,
    symbol: &'a str,
    rule: String,
    severity: &'static str,
    detail: &'a str,
}

impl<'a> From<&'a AnomalyRecord> for AnomalyRow<'a> {
    fn from(a: &'a AnomalyRecord) -> Self {
        Self {
            record: a.record,
            kind: &a.kind,
            timestamp: a.timestamp,
            symbol: a.symbol.as_deref().unwrap_or_default(),
            rule: a.rule.to_string(),
            severity: a.severity.as_str(),
            detail: &a.detail,
        }
    }
}

#[derive(Serialize)]
struct BarRow<'a> {
    record: usize,
    timestamp: f64,
    symbol: &'a str,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: Option<f64>,
}

#[derive(Serialize)]
struct VwapRow<'a> {
    record: usize,
    kind: &'a str,
    timestamp: f64,
    symbol: &'a str,
    vwap: Option<f64>,
    up1: Option<f64>,
    dn1: Option<f64>,
    up2: Option<f64>,
    dn2: Option<f64>,
    up3: Option<f64>,
    dn3: Option<f64>,
    up4: Option<f64>,
    dn4: Option<f64>,
}

#[derive(Serialize)]
struct ValueAreaRow<'a> {
    record: usize,
    kind: &'a str,
    timestamp: f64,
    symbol: &'a str,
    session: &'static str,
    high: f64,
    poc: f64,
    low: f64,
    ordered: bool,
}

// =============================================================================
// Writers
// =============================================================================

/// Write the report's anomaly detail rows.
///
/// # Errors
///
/// Returns `ExportError::Csv` on serialization or write failure.
pub fn write_anomalies_csv<W: Write>(report: &ValidationReport, out: W) -> Result<usize, ExportError> {
    let mut writer = csv::Writer::from_writer(out);
    for anomaly in &report.anomalies {
        writer.serialize(AnomalyRow::from(anomaly))?;
    }
    writer.flush()?;
    Ok(report.anomalies.len())
}

/// Write every price bar in the window.
///
/// # Errors
///
/// Returns `ExportError::Csv` on serialization or write failure.
pub fn write_bars_csv<W: Write>(window: &RecordWindow, out: W) -> Result<usize, ExportError> {
    write_rows(window, out, |ordinal, record| match &record.body {
        RecordBody::PriceBar(bar) => vec![BarRow {
            record: ordinal,
            timestamp: record.header.timestamp,
            symbol: record.symbol(),
            open: bar.o,
            high: bar.h,
            low: bar.l,
            close: bar.c,
            volume: bar.v,
        }],
        _ => Vec::new(),
    })
}

/// Write every VWAP band record in the window.
///
/// # Errors
///
/// Returns `ExportError::Csv` on serialization or write failure.
pub fn write_vwap_csv<W: Write>(window: &RecordWindow, out: W) -> Result<usize, ExportError> {
    write_rows(window, out, |ordinal, record| match &record.body {
        RecordBody::VwapBands(bands) => vec![VwapRow {
            record: ordinal,
            kind: record.kind(),
            timestamp: record.header.timestamp,
            symbol: record.symbol(),
            vwap: bands.vwap,
            up1: bands.up1,
            dn1: bands.dn1,
            up2: bands.up2,
            dn2: bands.dn2,
            up3: bands.up3,
            dn3: bands.dn3,
            up4: bands.up4,
            dn4: bands.dn4,
        }],
        _ => Vec::new(),
    })
}

/// Write one row per complete value-area triple in the window.
///
/// # Errors
///
/// Returns `ExportError::Csv` on serialization or write failure.
pub fn write_value_areas_csv<W: Write>(window: &RecordWindow, out: W) -> Result<usize, ExportError> {
    write_rows(window, out, |ordinal, record| match &record.body {
        RecordBody::ValueArea(area) => area
            .triples()
            .into_iter()
            .map(|triple| ValueAreaRow {
                record: ordinal,
                kind: record.kind(),
                timestamp: record.header.timestamp,
                symbol: record.symbol(),
                session: triple.session,
                high: triple.high,
                poc: triple.poc,
                low: triple.low,
                ordered: triple.is_ordered(),
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn write_rows<'a, W, R, F>(window: &'a RecordWindow, out: W, rows: F) -> Result<usize, ExportError>
where
    W: Write,
    R: Serialize,
    F: Fn(usize, &'a MarketRecord) -> Vec<R>,
{
    let mut writer = csv::Writer::from_writer(out);
    let mut written = 0;
    for (ordinal, record) in window.records().iter().enumerate() {
        for row in rows(ordinal, record) {
            writer.serialize(row)?;
            written += 1;
        }
    }
    writer.flush()?;
    Ok(written)
}

/// Write all four tables into `dir`, creating it if needed.
///
/// Returns the paths written.
///
/// # Errors
///
/// Returns `ExportError::Io` if the directory or a file cannot be created and
/// `ExportError::Csv` on write failure.
pub fn export_all(
    window: &RecordWindow,
    report: &ValidationReport,
    dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, ExportError> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;

    let anomalies = dir.join("anomalies.csv");
    let bars = dir.join("bars.csv");
    let vwap = dir.join("vwap.csv");
    let value_areas = dir.join("value_areas.csv");

    let counts = [
        write_anomalies_csv(report, File::create(&anomalies)?)?,
        write_bars_csv(window, File::create(&bars)?)?,
        write_vwap_csv(window, File::create(&vwap)?)?,
        write_value_areas_csv(window, File::create(&value_areas)?)?,
    ];

    info!(
        dir = %dir.display(),
        anomalies = counts[0],
        bars = counts[1],
        vwap = counts[2],
        value_areas = counts[3],
        "CSV exports written"
    );

    Ok(vec![anomalies, bars, vwap, value_areas])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::{MultiStreamValidator, ValidatorConfig};

    fn window() -> RecordWindow {
        RecordWindow::from_lines(
            [
                r#"{"type":"bar","ts":1700000000,"sym":"ES","o":10,"h":9,"l":8,"c":9.5,"v":100}"#,
                r#"{"type":"vwap","ts":1700000001,"sym":"ES","vwap":10,"up1":11,"dn1":9}"#,
                r#"{"type":"vva","ts":1700000002,"sym":"ES","vah":12,"vpoc":11,"val":10,"pvah":13,"ppoc":12,"pval":11}"#,
            ],
            None,
        )
    }

    fn to_string(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn anomalies_table_has_header_and_rows() {
        let window = window();
        let report = MultiStreamValidator::new(ValidatorConfig::default()).validate(&window);
        let mut out = Vec::new();
        let written = write_anomalies_csv(&report, &mut out).unwrap();

        let text = to_string(out);
        assert_eq!(written, report.anomalies.len());
        assert!(text.starts_with("record,kind,timestamp,symbol,rule,severity,detail"));
        assert!(text.contains("bar_range"));
    }

    #[test]
    fn bars_table() {
        let mut out = Vec::new();
        assert_eq!(write_bars_csv(&window(), &mut out).unwrap(), 1);
        let text = to_string(out);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("record,timestamp,symbol,open,high,low,close,volume")
        );
        assert_eq!(lines.next(), Some("0,1700000000.0,ES,10.0,9.0,8.0,9.5,100.0"));
    }

    #[test]
    fn vwap_table_leaves_missing_bands_empty() {
        let mut out = Vec::new();
        assert_eq!(write_vwap_csv(&window(), &mut out).unwrap(), 1);
        let text = to_string(out);
        assert!(text.lines().nth(1).unwrap().starts_with("1,vwap,1700000001.0,ES,10.0,11.0,9.0,,"));
    }

    #[test]
    fn value_area_table_has_row_per_session() {
        let mut out = Vec::new();
        assert_eq!(write_value_areas_csv(&window(), &mut out).unwrap(), 2);
    }

    #[test]
    fn export_all_writes_four_files() {
        let dir = tempfile::tempdir().unwrap();
        let window = window();
        let report = MultiStreamValidator::new(ValidatorConfig::default()).validate(&window);

        let paths = export_all(&window, &report, dir.path().join("out")).unwrap();
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.exists()));
    }
}
