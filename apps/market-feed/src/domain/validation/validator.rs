//! Single-pass multi-stream validator.
//!
//! Walks a [`RecordWindow`] once, dispatching on the record body. The pass
//! reads no clock and no randomness, so the same window always yields the
//! same report.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use super::report::{DepthStats, TimeSpan, ValidationReport};
use super::rules::{AnomalyRecord, AnomalyRule};
use crate::domain::records::{
    ClusterLevel, DepthSnapshot, MarketRecord, NbcvTotals, OrderflowBucket, PriceBar,
    QuoteRecord, RecordBody, TradeRecord, ValueArea, VixReading, VwapBands,
};

// =============================================================================
// Configuration
// =============================================================================

/// Default cap on row-level anomaly detail.
pub const DEFAULT_MAX_DETAIL_ROWS: usize = 10_000;

/// Default largest forward jump in the producer sequence.
pub const DEFAULT_MAX_SEQUENCE_GAP: u64 = 1_000;

/// Default relative tolerance, in percent, for number-bars totals and deltas.
pub const DEFAULT_NBCV_TOLERANCE_PCT: f64 = 5.0;

/// Default accepted volatility index range.
pub const DEFAULT_VIX_RANGE: (f64, f64) = (5.0, 100.0);

/// Validator configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatorConfig {
    /// Whether to keep row-level detail at all.
    pub include_details: bool,
    /// Maximum detail rows kept; counts are never capped.
    pub max_detail_rows: usize,
    /// Largest forward sequence jump accepted within a stream.
    pub max_sequence_gap: u64,
    /// Relative tolerance for `total == ask + bid`, in percent.
    pub nbcv_total_tolerance_pct: f64,
    /// Relative tolerance for `delta == ask - bid`, in percent.
    pub nbcv_delta_tolerance_pct: f64,
    /// Lowest accepted volatility index value.
    pub vix_min: f64,
    /// Highest accepted volatility index value.
    pub vix_max: f64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            include_details: true,
            max_detail_rows: DEFAULT_MAX_DETAIL_ROWS,
            max_sequence_gap: DEFAULT_MAX_SEQUENCE_GAP,
            nbcv_total_tolerance_pct: DEFAULT_NBCV_TOLERANCE_PCT,
            nbcv_delta_tolerance_pct: DEFAULT_NBCV_TOLERANCE_PCT,
            vix_min: DEFAULT_VIX_RANGE.0,
            vix_max: DEFAULT_VIX_RANGE.1,
        }
    }
}

impl ValidatorConfig {
    /// Set whether detail rows are kept.
    #[must_use]
    pub const fn with_details(mut self, include: bool) -> Self {
        self.include_details = include;
        self
    }

    /// Set the detail row cap.
    #[must_use]
    pub const fn with_max_detail_rows(mut self, max: usize) -> Self {
        self.max_detail_rows = max;
        self
    }

    /// Set the largest accepted sequence jump.
    #[must_use]
    pub const fn with_max_sequence_gap(mut self, gap: u64) -> Self {
        self.max_sequence_gap = gap;
        self
    }

    /// Set the number-bars tolerances, in percent.
    #[must_use]
    pub const fn with_nbcv_tolerance(mut self, total_pct: f64, delta_pct: f64) -> Self {
        self.nbcv_total_tolerance_pct = total_pct;
        self.nbcv_delta_tolerance_pct = delta_pct;
        self
    }

    /// Set the accepted volatility index range.
    #[must_use]
    pub const fn with_vix_range(mut self, min: f64, max: f64) -> Self {
        self.vix_min = min;
        self.vix_max = max;
        self
    }
}

// =============================================================================
// Window
// =============================================================================

/// A bounded, already-materialized set of records plus the count of lines
/// that failed to parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordWindow {
    records: Vec<MarketRecord>,
    skipped: usize,
}

impl RecordWindow {
    /// Empty window.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }

    /// Parse JSON Lines text.
    ///
    /// Blank lines are ignored. Malformed lines are counted and logged at
    /// debug level. With `max_records`, parsing stops once that many
    /// non-blank lines have been consumed.
    pub fn from_lines<'a, I>(lines: I, max_records: Option<usize>) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut window = Self::new();
        for (idx, line) in lines.into_iter().enumerate() {
            if max_records.is_some_and(|max| window.consumed() >= max) {
                break;
            }
            window.push_line(line, idx + 1);
        }
        window
    }

    /// Parse one line into the window.
    pub fn push_line(&mut self, line: &str, line_no: usize) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        match MarketRecord::parse_line(line, line_no) {
            Ok(record) => self.records.push(record),
            Err(err) => {
                debug!(line = err.line, reason = %err.reason, "Skipping malformed record");
                self.skipped += 1;
            }
        }
    }

    /// Parsed records in input order.
    #[must_use]
    pub fn records(&self) -> &[MarketRecord] {
        &self.records
    }

    /// Lines that failed to parse.
    #[must_use]
    pub const fn skipped_count(&self) -> usize {
        self.skipped
    }

    /// Non-blank lines consumed so far.
    #[must_use]
    pub fn consumed(&self) -> usize {
        self.records.len() + self.skipped
    }

    /// Number of parsed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record parsed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// =============================================================================
// Validator
// =============================================================================

/// Consistency validator over heterogeneous market-state records.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultiStreamValidator {
    config: ValidatorConfig,
}

impl MultiStreamValidator {
    /// Create a validator.
    #[must_use]
    pub const fn new(config: ValidatorConfig) -> Self {
        Self { config }
    }

    /// Validator configuration.
    #[must_use]
    pub const fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Run one pass over `window`.
    #[must_use]
    pub fn validate(&self, window: &RecordWindow) -> ValidationReport {
        let mut pass = Pass::new(self.config);
        pass.report.skipped_count = window.skipped_count();

        for (ordinal, record) in window.records().iter().enumerate() {
            pass.inspect(ordinal, record);
        }

        let report = pass.finish();
        info!(
            records = report.records_parsed,
            skipped = report.skipped_count,
            anomalies = report.total_anomalies(),
            "Validation pass complete"
        );
        report
    }
}

type StreamKey = (String, String);
type DuplicateKey = (String, String, u64, Option<i64>, String);

/// Mutable state for one pass.
struct Pass {
    config: ValidatorConfig,
    report: ValidationReport,
    last_timestamp: HashMap<StreamKey, f64>,
    last_index: HashMap<StreamKey, i64>,
    last_sequence: HashMap<StreamKey, i64>,
    seen: HashSet<DuplicateKey>,
    depth_records: usize,
    depth_levels_total: usize,
    depth_levels_max: usize,
}

impl Pass {
    fn new(config: ValidatorConfig) -> Self {
        Self {
            config,
            report: ValidationReport::default(),
            last_timestamp: HashMap::new(),
            last_index: HashMap::new(),
            last_sequence: HashMap::new(),
            seen: HashSet::new(),
            depth_records: 0,
            depth_levels_total: 0,
            depth_levels_max: 0,
        }
    }

    fn inspect(&mut self, ordinal: usize, record: &MarketRecord) {
        self.report.records_parsed += 1;
        *self
            .report
            .records_by_type
            .entry(record.kind().to_string())
            .or_default() += 1;

        let ts = record.header.timestamp;
        self.report
            .time_spans
            .entry(record.kind().to_string())
            .and_modify(|span| span.extend(ts))
            .or_insert_with(|| TimeSpan::at(ts));

        self.check_sequence(ordinal, record);

        match &record.body {
            RecordBody::PriceBar(bar) => self.check_bar(ordinal, record, bar),
            RecordBody::VwapBands(bands) => self.check_vwap(ordinal, record, bands),
            RecordBody::ValueArea(area) => self.check_value_area(ordinal, record, area),
            RecordBody::Depth(depth) => self.check_depth(ordinal, record, depth),
            RecordBody::Cluster(cluster) => self.tally_cluster(cluster),
            RecordBody::OrderflowBucket(bucket) => self.check_bucket(ordinal, record, bucket),
            RecordBody::Quote(quote) => self.check_quote(ordinal, record, quote),
            RecordBody::Trade(trade) => self.check_trade(ordinal, record, trade),
            RecordBody::Vix(vix) => self.check_vix(ordinal, record, vix),
            RecordBody::NbcvTotals(totals) => self.check_nbcv_totals(ordinal, record, totals),
            RecordBody::Other => {}
        }
    }

    fn finish(mut self) -> ValidationReport {
        if self.depth_records > 0 {
            self.report.depth = Some(DepthStats {
                records: self.depth_records,
                mean_levels: self.depth_levels_total as f64 / self.depth_records as f64,
                max_levels: self.depth_levels_max,
            });
        }
        self.report
    }

    fn flag(&mut self, ordinal: usize, record: &MarketRecord, rule: AnomalyRule, detail: String) {
        *self
            .report
            .anomaly_counts
            .entry(rule.to_string())
            .or_default() += 1;
        *self
            .report
            .severity_counts
            .entry(rule.severity())
            .or_default() += 1;

        if !self.config.include_details {
            return;
        }
        if self.report.anomalies.len() >= self.config.max_detail_rows {
            self.report.details_truncated = true;
            return;
        }
        self.report.anomalies.push(AnomalyRecord {
            record: ordinal,
            kind: record.kind().to_string(),
            timestamp: record.header.timestamp,
            symbol: record.header.symbol.clone(),
            rule,
            severity: rule.severity(),
            detail,
        });
    }

    // -------------------------------------------------------------------------
    // Stream-level checks
    // -------------------------------------------------------------------------

    fn check_sequence(&mut self, ordinal: usize, record: &MarketRecord) {
        let stream: StreamKey = (record.kind().to_string(), record.symbol().to_string());
        let ts = record.header.timestamp;

        if let Some(prev) = self.last_timestamp.insert(stream.clone(), ts)
            && ts < prev
        {
            self.flag(
                ordinal,
                record,
                AnomalyRule::TimestampRegression,
                format!("timestamp {ts} < previous {prev}"),
            );
        }

        if let Some(index) = record.header.position()
            && let Some(prev) = self.last_index.insert(stream.clone(), index)
            && index < prev
        {
            self.flag(
                ordinal,
                record,
                AnomalyRule::IndexRegression,
                format!("index {index} < previous {prev}"),
            );
        }

        if let Some(seq) = record.header.sequence()
            && seq > 0
            && let Some(prev) = self.last_sequence.insert(stream.clone(), seq)
            && seq - prev > 0
            && (seq - prev).unsigned_abs() > self.config.max_sequence_gap
        {
            self.flag(
                ordinal,
                record,
                AnomalyRule::SequenceGap,
                format!("sequence jumped from {prev} to {seq}"),
            );
        }

        let key: DuplicateKey = (
            stream.0,
            stream.1,
            ts.to_bits(),
            record.header.position(),
            record.discriminator(),
        );
        if !self.seen.insert(key) {
            self.flag(
                ordinal,
                record,
                AnomalyRule::DuplicateKey,
                format!("duplicate record at timestamp {ts}"),
            );
        }
    }

    // -------------------------------------------------------------------------
    // Per-type checks
    // -------------------------------------------------------------------------

    fn check_bar(&mut self, ordinal: usize, record: &MarketRecord, bar: &PriceBar) {
        if bar.h < bar.l || bar.h < bar.o.max(bar.c) || bar.l > bar.o.min(bar.c) {
            self.flag(
                ordinal,
                record,
                AnomalyRule::BarRange,
                format!("o={} h={} l={} c={}", bar.o, bar.h, bar.l, bar.c),
            );
        }
        if let Some(v) = bar.v
            && v < 0.0
        {
            self.flag(ordinal, record, AnomalyRule::NegativeVolume, format!("v={v}"));
        }
    }

    fn check_vwap(&mut self, ordinal: usize, record: &MarketRecord, bands: &VwapBands) {
        let levels = bands.levels();

        for (level, upper, lower) in levels {
            if let (Some(up), Some(dn)) = (upper, lower)
                && up < dn
            {
                self.flag(
                    ordinal,
                    record,
                    AnomalyRule::BandInversion { level },
                    format!("up{level}={up} < dn{level}={dn}"),
                );
            }
        }

        for pair in levels.windows(2) {
            let (inner_level, inner_up, inner_dn) = pair[0];
            let (outer_level, outer_up, outer_dn) = pair[1];
            let up_bad = matches!((inner_up, outer_up), (Some(i), Some(o)) if o < i);
            let dn_bad = matches!((inner_dn, outer_dn), (Some(i), Some(o)) if o > i);
            if up_bad || dn_bad {
                self.flag(
                    ordinal,
                    record,
                    AnomalyRule::BandOrder { level: outer_level },
                    format!("level {outer_level} band inside level {inner_level}"),
                );
            }
        }

        if let (Some(vwap), Some(up), Some(dn)) = (bands.vwap, bands.up1, bands.dn1)
            && up >= dn
            && (vwap > up || vwap < dn)
        {
            self.flag(
                ordinal,
                record,
                AnomalyRule::VwapOutsideBand,
                format!("vwap={vwap} outside [{dn}, {up}]"),
            );
        }
    }

    fn check_value_area(&mut self, ordinal: usize, record: &MarketRecord, area: &ValueArea) {
        for triple in area.triples() {
            if !triple.is_ordered() {
                self.flag(
                    ordinal,
                    record,
                    AnomalyRule::OrderViolation,
                    format!(
                        "{} session: vah={} vpoc={} val={}",
                        triple.session, triple.high, triple.poc, triple.low
                    ),
                );
            }
        }
    }

    fn check_depth(&mut self, ordinal: usize, record: &MarketRecord, depth: &DepthSnapshot) {
        let levels = depth.level_count();
        self.depth_records += 1;
        self.depth_levels_total += levels;
        self.depth_levels_max = self.depth_levels_max.max(levels);

        if let Some((side, level)) = depth.levels().find(|(_, l)| l.size < 0.0) {
            self.flag(
                ordinal,
                record,
                AnomalyRule::NegativeDepthSize,
                format!("{} size={} at price {}", side.as_str(), level.size, level.price),
            );
        }

        if let Some((bid, ask)) = depth.top_of_book()
            && bid > ask
        {
            self.flag(
                ordinal,
                record,
                AnomalyRule::CrossedBook,
                format!("best bid {bid} > best ask {ask}"),
            );
        }
    }

    fn tally_cluster(&mut self, cluster: &ClusterLevel) {
        *self
            .report
            .cluster_counts
            .entry(cluster.group_key().to_string())
            .or_default() += 1;
    }

    fn check_bucket(&mut self, ordinal: usize, record: &MarketRecord, bucket: &OrderflowBucket) {
        let missing = bucket.missing_blocks();
        if !missing.is_empty() {
            self.flag(
                ordinal,
                record,
                AnomalyRule::IncompleteBucket,
                format!("missing: {}", missing.join(", ")),
            );
        }
    }

    fn check_quote(&mut self, ordinal: usize, record: &MarketRecord, quote: &QuoteRecord) {
        if let (Some(bid), Some(ask)) = (quote.bid, quote.ask)
            && bid > ask
        {
            self.flag(
                ordinal,
                record,
                AnomalyRule::BidAskInverted,
                format!("bid {bid} > ask {ask}"),
            );
        }
    }

    fn check_trade(&mut self, ordinal: usize, record: &MarketRecord, trade: &TradeRecord) {
        let bad_price = trade.price.is_some_and(|p| p <= 0.0);
        let bad_qty = trade.quantity.is_some_and(|q| q <= 0.0);
        if bad_price || bad_qty {
            self.flag(
                ordinal,
                record,
                AnomalyRule::NonPositiveTrade,
                format!("price={:?} qty={:?}", trade.price, trade.quantity),
            );
        }
    }

    fn check_vix(&mut self, ordinal: usize, record: &MarketRecord, vix: &VixReading) {
        let (min, max) = (self.config.vix_min, self.config.vix_max);
        if let Some(last) = vix.last
            && !(min..=max).contains(&last)
        {
            self.flag(
                ordinal,
                record,
                AnomalyRule::VixOutOfRange,
                format!("last={last} outside [{min}, {max}]"),
            );
        }
    }

    fn check_nbcv_totals(&mut self, ordinal: usize, record: &MarketRecord, totals: &NbcvTotals) {
        let (Some(ask), Some(bid)) = (totals.ask, totals.bid) else {
            return;
        };

        if let Some(total) = totals.total
            && total > 0.0
            && relative_error(total, ask + bid) > self.config.nbcv_total_tolerance_pct / 100.0
        {
            self.flag(
                ordinal,
                record,
                AnomalyRule::NbcvTotalMismatch,
                format!("total={total} ask+bid={}", ask + bid),
            );
        }

        if let Some(delta) = totals.delta
            && delta != 0.0
            && relative_error(delta, ask - bid) > self.config.nbcv_delta_tolerance_pct / 100.0
        {
            self.flag(
                ordinal,
                record,
                AnomalyRule::NbcvDeltaMismatch,
                format!("delta={delta} ask-bid={}", ask - bid),
            );
        }
    }
}

/// `|reported - expected| / |reported|`; `reported` is non-zero.
fn relative_error(reported: f64, expected: f64) -> f64 {
    (reported - expected).abs() / reported.abs()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use test_case::test_case;

    use super::*;
    use crate::domain::validation::Severity;

    fn validate(lines: &[&str]) -> ValidationReport {
        let window = RecordWindow::from_lines(lines.iter().copied(), None);
        MultiStreamValidator::default().validate(&window)
    }

    #[test]
    fn inverted_band_is_flagged_at_its_level() {
        let report = validate(&[r#"{"t":1,"type":"vwap","up1":5293.0,"dn1":5296.0}"#]);
        assert_eq!(report.count(AnomalyRule::BandInversion { level: 1 }), 1);
        assert_eq!(
            report.anomaly_counts.get("band_inversion[level=1]"),
            Some(&1)
        );
        assert!(!report.is_clean());
    }

    #[test]
    fn ordered_band_is_not_flagged() {
        let report = validate(&[r#"{"t":1,"type":"vwap","up1":5297.0,"dn1":5293.0}"#]);
        assert_eq!(report.total_anomalies(), 0);
        assert!(report.is_clean());
    }

    #[test]
    fn inversion_at_outer_level_only() {
        let report = validate(&[
            r#"{"t":1,"type":"vwap","vwap":100,"up1":101,"dn1":99,"up2":102,"dn2":98,"up3":96,"dn3":104}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::BandInversion { level: 3 }), 1);
        assert_eq!(report.count(AnomalyRule::BandInversion { level: 1 }), 0);
        assert_eq!(report.count(AnomalyRule::BandOrder { level: 3 }), 1);
    }

    #[test]
    fn vwap_outside_first_band() {
        let report = validate(&[r#"{"t":1,"type":"vwap","vwap":110,"up1":101,"dn1":99}"#]);
        assert_eq!(report.count(AnomalyRule::VwapOutsideBand), 1);
    }

    #[test_case(100.0, 95.0, 90.0, 0 ; "ordered")]
    #[test_case(90.0, 95.0, 100.0, 1 ; "fully inverted")]
    #[test_case(100.0, 101.0, 90.0, 1 ; "poc above high")]
    #[test_case(100.0, 100.0, 100.0, 0 ; "degenerate")]
    fn value_area_ordering(vah: f64, vpoc: f64, val: f64, expected: usize) {
        let line = format!(r#"{{"t":1,"type":"vva","vah":{vah},"vpoc":{vpoc},"val":{val}}}"#);
        let report = validate(&[&line]);
        assert_eq!(report.count(AnomalyRule::OrderViolation), expected);
    }

    #[test]
    fn depth_statistics_mean_and_max() {
        let report = validate(&[
            r#"{"t":1,"type":"depth","bids":[{"price":99,"size":1}],"asks":[{"price":100,"size":1}]}"#,
            r#"{"t":2,"type":"depth","bids":[{"price":99,"size":1},{"price":98,"size":1}],"asks":[{"price":100,"size":1},{"price":101,"size":2}]}"#,
        ]);
        let depth = report.depth.unwrap();
        assert_eq!(depth.records, 2);
        assert_eq!(depth.max_levels, 4);
        assert_eq!(depth.mean_levels, 3.0);
        assert_eq!(report.total_anomalies(), 0);
    }

    #[test]
    fn no_depth_records_means_no_depth_stats() {
        let report = validate(&[r#"{"t":1,"type":"vwap","up1":2,"dn1":1}"#]);
        assert!(report.depth.is_none());
    }

    #[test]
    fn crossed_book_and_negative_size() {
        let report = validate(&[
            r#"{"t":1,"type":"depth","bids":[{"price":101,"size":-1}],"asks":[{"price":100,"size":1}]}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::CrossedBook), 1);
        assert_eq!(report.count(AnomalyRule::NegativeDepthSize), 1);
    }

    #[test]
    fn clusters_tallied_by_group_key() {
        let report = validate(&[
            r#"{"t":1,"type":"menthorq_level","level_type":"call_resistance","price":5400}"#,
            r#"{"t":1,"type":"menthorq_level","level_type":"put_support","price":5200}"#,
            r#"{"t":2,"type":"menthorq_level","level_type":"call_resistance","price":5410}"#,
            r#"{"t":3,"type":"cluster_alert","group":"g7"}"#,
        ]);
        assert_eq!(report.cluster_counts.get("call_resistance"), Some(&2));
        assert_eq!(report.cluster_counts.get("put_support"), Some(&1));
        assert_eq!(report.cluster_counts.get("g7"), Some(&1));
        assert_eq!(report.total_anomalies(), 0);
    }

    #[test]
    fn incomplete_bucket_counted_once_per_record() {
        let report = validate(&[
            r#"{"t":1,"type":"nbcv","footprint":{},"metrics":{},"orderflow":{}}"#,
            r#"{"t":2,"type":"nbcv","footprint":{}}"#,
            r#"{"t":3,"type":"nbcv"}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::IncompleteBucket), 2);
    }

    #[test]
    fn timestamp_regression_per_stream() {
        let report = validate(&[
            r#"{"t":10,"sym":"ES","type":"quote","bid":1,"ask":2}"#,
            r#"{"t":5,"sym":"NQ","type":"quote","bid":1,"ask":2}"#,
            r#"{"t":9,"sym":"ES","type":"quote","bid":1,"ask":2}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::TimestampRegression), 1);
        let row = report
            .anomalies_for(AnomalyRule::TimestampRegression)
            .next()
            .unwrap();
        assert_eq!(row.record, 2);
        assert_eq!(row.severity, Severity::Warning);
    }

    #[test]
    fn index_regression_and_duplicates() {
        let report = validate(&[
            r#"{"t":1,"i":5,"type":"basedata","o":1,"h":2,"l":1,"c":2}"#,
            r#"{"t":1,"i":5,"type":"basedata","o":1,"h":2,"l":1,"c":2}"#,
            r#"{"t":2,"i":4,"type":"basedata","o":1,"h":2,"l":1,"c":2}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::DuplicateKey), 1);
        assert_eq!(report.count(AnomalyRule::IndexRegression), 1);
    }

    #[test]
    fn depth_rows_at_different_levels_are_not_duplicates() {
        let report = validate(&[
            r#"{"t":1,"type":"depth","side":"BID","lvl":1,"price":99,"size":1}"#,
            r#"{"t":1,"type":"depth","side":"BID","lvl":2,"price":98,"size":1}"#,
            r#"{"t":1,"type":"depth","side":"ASK","lvl":1,"price":100,"size":1}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::DuplicateKey), 0);
        assert_eq!(report.depth.unwrap().max_levels, 1);
    }

    #[test]
    fn bar_quote_and_trade_rules() {
        let report = validate(&[
            r#"{"t":1,"type":"basedata","o":10,"h":9,"l":8,"c":10.5,"v":-3}"#,
            r#"{"t":1,"type":"quote","bid":101,"ask":100}"#,
            r#"{"t":1,"type":"trade","px":100,"qty":0}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::BarRange), 1);
        assert_eq!(report.count(AnomalyRule::NegativeVolume), 1);
        assert_eq!(report.count(AnomalyRule::BidAskInverted), 1);
        assert_eq!(report.count(AnomalyRule::NonPositiveTrade), 1);
        assert_eq!(report.severity_counts.get(&Severity::Error), Some(&4));
    }

    #[test]
    fn detail_rows_are_capped_but_counts_are_not() {
        let lines: Vec<String> = (0..5)
            .map(|i| format!(r#"{{"t":{i},"type":"vwap","up1":1,"dn1":2}}"#))
            .collect();
        let window = RecordWindow::from_lines(lines.iter().map(String::as_str), None);
        let validator =
            MultiStreamValidator::new(ValidatorConfig::default().with_max_detail_rows(2));
        let report = validator.validate(&window);
        assert_eq!(report.count(AnomalyRule::BandInversion { level: 1 }), 5);
        assert_eq!(report.anomalies.len(), 2);
        assert!(report.details_truncated);
    }

    #[test]
    fn details_can_be_disabled() {
        let window = RecordWindow::from_lines([r#"{"t":1,"type":"vwap","up1":1,"dn1":2}"#], None);
        let report =
            MultiStreamValidator::new(ValidatorConfig::default().with_details(false)).validate(&window);
        assert_eq!(report.total_anomalies(), 1);
        assert!(report.anomalies.is_empty());
        assert!(!report.details_truncated);
    }

    #[test]
    fn records_by_type_and_time_spans() {
        let report = validate(&[
            r#"{"t":5,"type":"vwap_current","up1":2,"dn1":1}"#,
            r#"{"t":3,"type":"vwap_previous","up1":2,"dn1":1}"#,
            r#"{"t":7,"type":"vwap_current","up1":2,"dn1":1}"#,
            r#"{"t":1,"type":"vix","last":14}"#,
        ]);
        assert_eq!(report.records_by_type.get("vwap_current"), Some(&2));
        assert_eq!(report.records_by_type.get("vix"), Some(&1));
        let span = report.time_spans.get("vwap_current").unwrap();
        assert_eq!((span.earliest, span.latest), (5.0, 7.0));
    }

    #[test]
    fn blank_lines_are_ignored_and_max_records_bounds_window() {
        let window = RecordWindow::from_lines(
            [
                r#"{"t":1,"type":"vix"}"#,
                "",
                "garbage",
                r#"{"t":2,"type":"vix"}"#,
                r#"{"t":3,"type":"vix"}"#,
            ],
            Some(3),
        );
        assert_eq!(window.len(), 2);
        assert_eq!(window.skipped_count(), 1);
    }

    #[test]
    fn producer_vwap_layouts_are_checked() {
        let report = validate(&[
            r#"{"t":1,"sym":"ES","type":"vwap_current","bar":7,"source":"graph4","vwap":5295.00,"s_plus_1":5290.00,"s_minus_1":5300.00,"s_plus_2":5285.00,"s_minus_2":5305.00,"study_id":1}"#,
            r#"{"t":1,"sym":"ES","type":"pvwap","i":7,"prev_start":1,"prev_end":6,"pvwap":5295.0,"up1":5290.0,"dn1":5300.0,"up2":5305.0,"dn2":5285.0,"up3":5310.0,"dn3":5280.0,"up4":5315.0,"dn4":5275.0,"chart":4}"#,
            r#"{"t":1,"sym":"ES","type":"vwap","src":"study","i":7,"v":5400.0,"up1":5301.0,"dn1":5299.0,"up2":5302.0,"dn2":5298.0,"chart":3}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::BandInversion { level: 1 }), 2);
        assert_eq!(report.count(AnomalyRule::VwapOutsideBand), 1);
        let kinds: Vec<&str> = report
            .anomalies_for(AnomalyRule::BandInversion { level: 1 })
            .map(|a| a.kind.as_str())
            .collect();
        assert_eq!(kinds, ["vwap_current", "pvwap"]);
    }

    #[test]
    fn vwap_previous_with_sigma_fields_is_clean() {
        let report = validate(&[
            r#"{"t":1,"sym":"ES","type":"vwap_previous","bar":12,"source":"graph4","pvwap":5300.00,"psd_plus_1":8.00,"psd_minus_1":8.00,"up1":5302.00,"dn1":5298.00,"study_id":13}"#,
        ]);
        assert_eq!(report.skipped_count, 0);
        assert_eq!(report.total_anomalies(), 0);
    }

    #[test]
    fn volume_profile_rows_are_ordered_checked() {
        let report = validate(&[
            r#"{"t":1,"sym":"ES","type":"volume_profile","source":"vp","poc":95,"vah":90,"val":100,"study":"VP","chart":4,"instance_id":1}"#,
            r#"{"t":1,"sym":"ES","type":"volume_profile_previous","bar":3,"ppoc":101,"pvah":99,"pval":89,"study_id":2}"#,
            r#"{"t":2,"sym":"ES","type":"volume_profile","poc":95,"vah":100,"pval":90}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::OrderViolation), 2);
    }

    #[test]
    fn trade_vol_field_is_checked() {
        let report = validate(&[r#"{"t":1,"type":"trade","px":5300,"vol":0}"#]);
        assert_eq!(report.count(AnomalyRule::NonPositiveTrade), 1);
    }

    #[test_case(200.0, 40.0, 0, 0 ; "consistent")]
    #[test_case(230.0, 40.0, 1, 0 ; "total off")]
    #[test_case(209.0, 41.0, 0, 0 ; "within tolerance")]
    #[test_case(200.0, -40.0, 0, 1 ; "delta sign flipped")]
    #[test_case(0.0, 0.0, 0, 0 ; "zero total and delta skipped")]
    fn nbcv_consistency(total: f64, delta: f64, total_flags: usize, delta_flags: usize) {
        let line = format!(
            r#"{{"t":1,"sym":"ES","type":"numbers_bars_calculated_values_graph4","i":40,"ask":120,"bid":80,"delta":{delta},"trades":55,"cumdelta":300,"total":{total},"source_graph":4,"study_id":9,"seq":812}}"#
        );
        let report = validate(&[&line]);
        assert_eq!(report.count(AnomalyRule::NbcvTotalMismatch), total_flags);
        assert_eq!(report.count(AnomalyRule::NbcvDeltaMismatch), delta_flags);
    }

    #[test]
    fn nbcv_tolerance_is_configurable() {
        let window = RecordWindow::from_lines(
            [r#"{"t":1,"type":"numbers_bars_calculated_values_graph","ask":120,"bid":80,"delta":40,"total":209}"#],
            None,
        );
        let strict =
            MultiStreamValidator::new(ValidatorConfig::default().with_nbcv_tolerance(1.0, 1.0));
        assert_eq!(strict.validate(&window).count(AnomalyRule::NbcvTotalMismatch), 1);
    }

    #[test_case(14.2, 0 ; "normal")]
    #[test_case(5.0, 0 ; "at minimum")]
    #[test_case(2.0, 1 ; "below range")]
    #[test_case(150.0, 1 ; "above range")]
    fn vix_range(last: f64, expected: usize) {
        let line = format!(r#"{{"t":1,"type":"vix","i":3,"last":{last},"mode":0,"chart":8}}"#);
        let report = validate(&[&line]);
        assert_eq!(report.count(AnomalyRule::VixOutOfRange), expected);
    }

    #[test]
    fn vix_range_is_configurable() {
        let window = RecordWindow::from_lines([r#"{"t":1,"type":"vix","last":14.2}"#], None);
        let narrow =
            MultiStreamValidator::new(ValidatorConfig::default().with_vix_range(15.0, 40.0));
        assert_eq!(narrow.validate(&window).count(AnomalyRule::VixOutOfRange), 1);
    }

    #[test]
    fn sequence_gaps_above_limit() {
        let report = validate(&[
            r#"{"t":1,"sym":"ES","type":"basedata","i":1,"seq":10,"o":1,"h":2,"l":1,"c":2}"#,
            r#"{"t":2,"sym":"ES","type":"basedata","i":2,"seq":900,"o":1,"h":2,"l":1,"c":2}"#,
            r#"{"t":3,"sym":"ES","type":"basedata","i":3,"seq":2500,"o":1,"h":2,"l":1,"c":2}"#,
            r#"{"t":4,"sym":"NQ","type":"basedata","i":1,"seq":9000,"o":1,"h":2,"l":1,"c":2}"#,
        ]);
        assert_eq!(report.count(AnomalyRule::SequenceGap), 1);
        assert_eq!(report.count(AnomalyRule::IndexRegression), 0);
        let gap = report.anomalies_for(AnomalyRule::SequenceGap).next().unwrap();
        assert_eq!(gap.record, 2);

        let window = RecordWindow::from_lines(
            [
                r#"{"t":1,"type":"vix","seq":1,"last":14}"#,
                r#"{"t":2,"type":"vix","seq":5,"last":14}"#,
            ],
            None,
        );
        let tight = MultiStreamValidator::new(ValidatorConfig::default().with_max_sequence_gap(3));
        assert_eq!(tight.validate(&window).count(AnomalyRule::SequenceGap), 1);
    }

    proptest! {
        #[test]
        fn ordered_value_areas_never_flagged(low in 0.0f64..1.0e4, a in 0.0f64..500.0, b in 0.0f64..500.0) {
            let poc = low + a;
            let high = poc + b;
            let line = format!(r#"{{"t":1,"type":"vva","vah":{high},"vpoc":{poc},"val":{low}}}"#);
            let report = validate(&[&line]);
            prop_assert_eq!(report.count(AnomalyRule::OrderViolation), 0);
        }
    }
}
