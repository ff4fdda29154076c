//! Persisted market-state records.
//!
//! Each JSON Lines row carries a common header (timestamp, type, optional
//! symbol, chart and sequence index) and a type-specific body. The body is a
//! sum type keyed by the `type` discriminator; unknown types are kept as
//! [`RecordBody::Other`] so they can still be counted.
//!
//! # Accepted `type` values
//!
//! | Variant | `type` |
//! |---------|--------|
//! | `PriceBar` | `basedata`, `bar` |
//! | `VwapBands` | `vwap`, `vwap_current`, `vwap_previous`, `pvwap` |
//! | `ValueArea` | `vva`, `vva_previous`, `volume_profile`, `volume_profile_previous` |
//! | `Depth` | `depth` |
//! | `Cluster` | `cluster`, `menthorq_level`, `cluster_alert` |
//! | `OrderflowBucket` | `nbcv`, `orderflow_bucket` |
//! | `Quote` | `quote` |
//! | `Trade` | `trade` |
//! | `Vix` | `vix` |
//! | `NbcvTotals` | any type starting with `numbers_bars_calculated_values` |

mod de;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Errors
// =============================================================================

/// A line that could not be turned into a [`MarketRecord`].
///
/// Never aborts a validation pass; it is counted and logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed record at line {line}: {reason}")]
pub struct MalformedRecord {
    /// 1-based line number in the source.
    pub line: usize,
    /// Parser message.
    pub reason: String,
}

// =============================================================================
// Header
// =============================================================================

/// Fields shared by every record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    /// Type discriminator exactly as written by the producer.
    #[serde(rename = "type")]
    pub kind: String,
    /// Epoch seconds.
    #[serde(alias = "t", alias = "ts", deserialize_with = "de::timestamp")]
    pub timestamp: f64,
    /// Symbol or instrument label.
    #[serde(default, alias = "sym", deserialize_with = "de::opt_label")]
    pub symbol: Option<String>,
    /// Chart identifier.
    #[serde(default, deserialize_with = "de::opt_label")]
    pub chart: Option<String>,
    /// Producer bar or row index.
    #[serde(default, alias = "i", deserialize_with = "de::opt_index")]
    pub index: Option<i64>,
    /// Producer-wide write sequence, when the producer keeps one.
    #[serde(default, deserialize_with = "de::opt_index")]
    pub seq: Option<i64>,
}

impl RecordHeader {
    /// Position used for ordering and duplicate checks: `index`, else `seq`.
    #[must_use]
    pub const fn position(&self) -> Option<i64> {
        match self.index {
            Some(index) => Some(index),
            None => self.seq,
        }
    }

    /// Counter used for gap detection: `seq`, else `index`.
    #[must_use]
    pub const fn sequence(&self) -> Option<i64> {
        match self.seq {
            Some(seq) => Some(seq),
            None => self.index,
        }
    }
}

// =============================================================================
// Bodies
// =============================================================================

/// OHLCV bar.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceBar {
    /// Open.
    #[serde(alias = "open")]
    pub o: f64,
    /// High.
    #[serde(alias = "high")]
    pub h: f64,
    /// Low.
    #[serde(alias = "low")]
    pub l: f64,
    /// Close.
    #[serde(alias = "close")]
    pub c: f64,
    /// Volume.
    #[serde(default, alias = "volume")]
    pub v: Option<f64>,
}

/// VWAP with up to four standard-deviation bands on each side.
///
/// Producers name the same values differently: the VWAP itself as `vwap`,
/// `v`, `value` or `pvwap`, and the bands as `upN`/`dnN` or
/// `s_plus_N`/`s_minus_N`. The first name present wins.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawVwapBands")]
#[allow(missing_docs)]
pub struct VwapBands {
    pub vwap: Option<f64>,
    pub up1: Option<f64>,
    pub dn1: Option<f64>,
    pub up2: Option<f64>,
    pub dn2: Option<f64>,
    pub up3: Option<f64>,
    pub dn3: Option<f64>,
    pub up4: Option<f64>,
    pub dn4: Option<f64>,
}

#[derive(Deserialize)]
struct RawVwapBands {
    #[serde(default)]
    vwap: Option<f64>,
    #[serde(default)]
    v: Option<f64>,
    #[serde(default)]
    value: Option<f64>,
    #[serde(default)]
    pvwap: Option<f64>,
    #[serde(default)]
    up1: Option<f64>,
    #[serde(default)]
    dn1: Option<f64>,
    #[serde(default)]
    up2: Option<f64>,
    #[serde(default)]
    dn2: Option<f64>,
    #[serde(default)]
    up3: Option<f64>,
    #[serde(default)]
    dn3: Option<f64>,
    #[serde(default)]
    up4: Option<f64>,
    #[serde(default)]
    dn4: Option<f64>,
    #[serde(default)]
    s_plus_1: Option<f64>,
    #[serde(default)]
    s_minus_1: Option<f64>,
    #[serde(default)]
    s_plus_2: Option<f64>,
    #[serde(default)]
    s_minus_2: Option<f64>,
    #[serde(default)]
    s_plus_3: Option<f64>,
    #[serde(default)]
    s_minus_3: Option<f64>,
    #[serde(default)]
    s_plus_4: Option<f64>,
    #[serde(default)]
    s_minus_4: Option<f64>,
}

impl From<RawVwapBands> for VwapBands {
    fn from(raw: RawVwapBands) -> Self {
        Self {
            vwap: raw.vwap.or(raw.v).or(raw.value).or(raw.pvwap),
            up1: raw.up1.or(raw.s_plus_1),
            dn1: raw.dn1.or(raw.s_minus_1),
            up2: raw.up2.or(raw.s_plus_2),
            dn2: raw.dn2.or(raw.s_minus_2),
            up3: raw.up3.or(raw.s_plus_3),
            dn3: raw.dn3.or(raw.s_minus_3),
            up4: raw.up4.or(raw.s_plus_4),
            dn4: raw.dn4.or(raw.s_minus_4),
        }
    }
}

impl VwapBands {
    /// Band pairs as `(level, upper, lower)`, level 1 innermost.
    #[must_use]
    pub const fn levels(&self) -> [(u8, Option<f64>, Option<f64>); 4] {
        [
            (1, self.up1, self.dn1),
            (2, self.up2, self.dn2),
            (3, self.up3, self.dn3),
            (4, self.up4, self.dn4),
        ]
    }
}

/// Volume value area, current session and optionally the previous one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ValueArea {
    /// Value-area high.
    #[serde(default)]
    pub vah: Option<f64>,
    /// Point of control.
    #[serde(default, alias = "poc")]
    pub vpoc: Option<f64>,
    /// Value-area low.
    #[serde(default)]
    pub val: Option<f64>,
    /// Previous session value-area high.
    #[serde(default)]
    pub pvah: Option<f64>,
    /// Previous session point of control.
    #[serde(default)]
    pub ppoc: Option<f64>,
    /// Previous session value-area low.
    #[serde(default)]
    pub pval: Option<f64>,
}

/// One fully populated `(high, poc, low)` triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueAreaTriple {
    /// `"current"` or `"previous"`.
    pub session: &'static str,
    /// Value-area high.
    pub high: f64,
    /// Point of control.
    pub poc: f64,
    /// Value-area low.
    pub low: f64,
}

impl ValueAreaTriple {
    /// `high >= poc >= low`.
    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.high >= self.poc && self.poc >= self.low
    }
}

impl ValueArea {
    /// Triples with all three values present.
    ///
    /// A lone `pval` (no previous high or poc) stands in for a missing `val`,
    /// which is how volume-profile rows sometimes carry their low.
    #[must_use]
    pub fn triples(&self) -> Vec<ValueAreaTriple> {
        let mut out = Vec::with_capacity(2);
        let previous_complete = self.pvah.is_some() && self.ppoc.is_some();
        let low = match self.val {
            Some(val) => Some(val),
            None if !previous_complete => self.pval,
            None => None,
        };
        if let (Some(high), Some(poc), Some(low)) = (self.vah, self.vpoc, low) {
            out.push(ValueAreaTriple {
                session: "current",
                high,
                poc,
                low,
            });
        }
        if let (Some(high), Some(poc), Some(low)) = (self.pvah, self.ppoc, self.pval) {
            out.push(ValueAreaTriple {
                session: "previous",
                high,
                poc,
                low,
            });
        }
        out
    }
}

/// Book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    /// Bid side.
    Bid,
    /// Ask side.
    Ask,
}

impl BookSide {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bid => "bid",
            Self::Ask => "ask",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "bid" | "b" | "buy" => Some(Self::Bid),
            "ask" | "a" | "sell" | "offer" => Some(Self::Ask),
            _ => None,
        }
    }
}

/// One price level of the book.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct DepthLevel {
    /// Level number, 0 or 1 being top of book depending on producer.
    #[serde(default, alias = "lvl")]
    pub level: Option<u32>,
    /// Price.
    #[serde(alias = "px")]
    pub price: f64,
    /// Size.
    #[serde(alias = "qty")]
    pub size: f64,
}

/// Depth record.
///
/// Producers write either a two-sided snapshot (`bids`/`asks` arrays) or a
/// single level per row (`side`, `lvl`, `price`, `size`). Both land here; a
/// single-level row keeps its side and level in `row`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawDepth")]
pub struct DepthSnapshot {
    /// Bid levels.
    pub bids: Vec<DepthLevel>,
    /// Ask levels.
    pub asks: Vec<DepthLevel>,
    /// Side and level when the record is a single-level row.
    pub row: Option<(BookSide, Option<u32>)>,
}

impl DepthSnapshot {
    /// Bid levels plus ask levels.
    #[must_use]
    pub fn level_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Highest bid and lowest ask when both sides are present.
    #[must_use]
    pub fn top_of_book(&self) -> Option<(f64, f64)> {
        let best_bid = self.bids.iter().map(|l| l.price).reduce(f64::max)?;
        let best_ask = self.asks.iter().map(|l| l.price).reduce(f64::min)?;
        Some((best_bid, best_ask))
    }

    /// Iterate all levels with their side.
    pub fn levels(&self) -> impl Iterator<Item = (BookSide, &DepthLevel)> {
        self.bids
            .iter()
            .map(|l| (BookSide::Bid, l))
            .chain(self.asks.iter().map(|l| (BookSide::Ask, l)))
    }
}

#[derive(Deserialize)]
struct RawDepth {
    #[serde(default, alias = "BID")]
    bids: Vec<DepthLevel>,
    #[serde(default, alias = "ASK")]
    asks: Vec<DepthLevel>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default, alias = "lvl")]
    level: Option<u32>,
    #[serde(default, alias = "px")]
    price: Option<f64>,
    #[serde(default, alias = "qty")]
    size: Option<f64>,
}

impl TryFrom<RawDepth> for DepthSnapshot {
    type Error = String;

    fn try_from(raw: RawDepth) -> Result<Self, Self::Error> {
        let Some(side) = raw.side else {
            return Ok(Self {
                bids: raw.bids,
                asks: raw.asks,
                row: None,
            });
        };

        let side = BookSide::parse(&side).ok_or_else(|| format!("unknown book side '{side}'"))?;
        let (Some(price), Some(size)) = (raw.price, raw.size) else {
            return Err("single-level depth row needs price and size".to_string());
        };
        let level = DepthLevel {
            level: raw.level,
            price,
            size,
        };

        let (bids, asks) = match side {
            BookSide::Bid => (vec![level], Vec::new()),
            BookSide::Ask => (Vec::new(), vec![level]),
        };
        Ok(Self {
            bids,
            asks,
            row: Some((side, raw.level)),
        })
    }
}

/// Computed level or cluster alert.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClusterLevel {
    /// Level family (e.g. `call_resistance`, `gamma_wall`).
    #[serde(default)]
    pub level_type: Option<String>,
    /// Alert group, used when no level family is given.
    #[serde(default)]
    pub group: Option<String>,
    /// Level price.
    #[serde(default)]
    pub price: Option<f64>,
}

impl ClusterLevel {
    /// Key used to tally clusters.
    #[must_use]
    pub fn group_key(&self) -> &str {
        self.level_type
            .as_deref()
            .or(self.group.as_deref())
            .unwrap_or("unknown")
    }
}

/// Number-bars cumulative-volume bucket with three correlated sub-blocks.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OrderflowBucket {
    /// Footprint block.
    #[serde(default)]
    pub footprint: Option<Value>,
    /// Metrics block.
    #[serde(default)]
    pub metrics: Option<Value>,
    /// Orderflow block.
    #[serde(default)]
    pub orderflow: Option<Value>,
}

impl OrderflowBucket {
    /// Names of absent (or null) sub-blocks.
    #[must_use]
    pub fn missing_blocks(&self) -> Vec<&'static str> {
        [
            ("footprint", &self.footprint),
            ("metrics", &self.metrics),
            ("orderflow", &self.orderflow),
        ]
        .into_iter()
        .filter(|(_, block)| block.as_ref().is_none_or(Value::is_null))
        .map(|(name, _)| name)
        .collect()
    }
}

/// Top-of-book quote.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QuoteRecord {
    /// Bid.
    #[serde(default)]
    pub bid: Option<f64>,
    /// Ask.
    #[serde(default)]
    pub ask: Option<f64>,
}

/// Time and sales print.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TradeRecord {
    /// Price.
    #[serde(default, alias = "px")]
    pub price: Option<f64>,
    /// Quantity.
    #[serde(default, alias = "qty", alias = "vol")]
    pub quantity: Option<f64>,
}

/// Number-bars calculated values: ask and bid volume with their total and
/// delta as computed by the producer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NbcvTotals {
    /// Volume traded at the ask.
    #[serde(default, alias = "ask_volume")]
    pub ask: Option<f64>,
    /// Volume traded at the bid.
    #[serde(default, alias = "bid_volume")]
    pub bid: Option<f64>,
    /// Reported total volume.
    #[serde(default, alias = "total_volume")]
    pub total: Option<f64>,
    /// Reported ask minus bid.
    #[serde(default)]
    pub delta: Option<f64>,
}

/// Volatility index print.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct VixReading {
    /// Last value.
    #[serde(default)]
    pub last: Option<f64>,
}

/// Prefix shared by every number-bars calculated-values type
/// (`numbers_bars_calculated_values_graph4`, ...).
const NBCV_TOTALS_PREFIX: &str = "numbers_bars_calculated_values";

/// Type-specific part of a record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum RecordBody {
    /// Price bar.
    #[serde(rename = "basedata", alias = "bar")]
    PriceBar(PriceBar),
    /// VWAP bands.
    #[serde(
        rename = "vwap",
        alias = "vwap_current",
        alias = "vwap_previous",
        alias = "pvwap"
    )]
    VwapBands(VwapBands),
    /// Volume value area.
    #[serde(
        rename = "vva",
        alias = "vva_previous",
        alias = "volume_profile",
        alias = "volume_profile_previous"
    )]
    ValueArea(ValueArea),
    /// Order-book depth.
    #[serde(rename = "depth")]
    Depth(DepthSnapshot),
    /// Computed cluster or option-style level.
    #[serde(rename = "cluster", alias = "menthorq_level", alias = "cluster_alert")]
    Cluster(ClusterLevel),
    /// Bucket with footprint, metrics, and orderflow blocks.
    #[serde(rename = "nbcv", alias = "orderflow_bucket")]
    OrderflowBucket(OrderflowBucket),
    /// Top-of-book quote.
    #[serde(rename = "quote")]
    Quote(QuoteRecord),
    /// Trade print.
    #[serde(rename = "trade")]
    Trade(TradeRecord),
    /// Volatility index print.
    #[serde(rename = "vix")]
    Vix(VixReading),
    /// Number-bars calculated values. Matched by type prefix in
    /// [`MarketRecord::parse_line`], never by tag.
    #[serde(skip)]
    NbcvTotals(NbcvTotals),
    /// Any other type; counted, not checked.
    #[serde(other)]
    Other,
}

// =============================================================================
// Record
// =============================================================================

/// A single persisted, typed unit of market state.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketRecord {
    /// Shared fields.
    pub header: RecordHeader,
    /// Type-specific fields.
    pub body: RecordBody,
}

impl MarketRecord {
    /// Parse one JSON Lines row.
    ///
    /// # Errors
    ///
    /// Returns `MalformedRecord` if the line is not a JSON object, lacks a
    /// type or timestamp, or does not fit its type's shape.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self, MalformedRecord> {
        let malformed = |reason: String| MalformedRecord {
            line: line_no,
            reason,
        };

        let value: Value = serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
        if !value.is_object() {
            return Err(malformed("expected a JSON object".to_string()));
        }

        let header = RecordHeader::deserialize(&value).map_err(|e| malformed(e.to_string()))?;
        let body = if header.kind.starts_with(NBCV_TOTALS_PREFIX) {
            NbcvTotals::deserialize(&value).map(RecordBody::NbcvTotals)
        } else {
            RecordBody::deserialize(&value)
        }
        .map_err(|e| malformed(e.to_string()))?;

        Ok(Self { header, body })
    }

    /// Type discriminator as written.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.header.kind
    }

    /// Symbol, or an empty string.
    #[must_use]
    pub fn symbol(&self) -> &str {
        self.header.symbol.as_deref().unwrap_or_default()
    }

    /// Part of the duplicate key that tells apart records legitimately
    /// sharing `(type, symbol, timestamp, index)`.
    #[must_use]
    pub fn discriminator(&self) -> String {
        match &self.body {
            RecordBody::Depth(depth) => match depth.row {
                Some((side, level)) => format!(
                    "{}:{}",
                    side.as_str(),
                    level.map_or_else(String::new, |l| l.to_string())
                ),
                None => String::new(),
            },
            RecordBody::Cluster(cluster) => format!(
                "{}:{}",
                cluster.group_key(),
                cluster.price.map_or_else(String::new, |p| p.to_string())
            ),
            _ => String::new(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
