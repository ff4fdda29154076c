//! Point-in-time market snapshots.
//!
//! The upstream feed pushes fields independently and encodes "no value" as
//! NaN (or `-1` before the first tick). [`RawQuote`] carries those values as
//! received; [`Snapshot`] is the sanitized view callers see, where every
//! missing value is `None`.

use std::fmt;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use super::contract::ContractDescriptor;

/// Outcome of a snapshot call. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotMode {
    /// A usable snapshot was observed within the wait bound.
    Live,
    /// The wait bound elapsed first; fields are whatever was seen.
    Timeout,
    /// No contract could be resolved; all fields are empty.
    NoContract,
}

impl SnapshotMode {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Timeout => "timeout",
            Self::NoContract => "no_contract",
        }
    }
}

impl fmt::Display for SnapshotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latest buffered values exactly as the upstream reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawQuote {
    /// Last trade price.
    pub last: Option<f64>,
    /// Best bid.
    pub bid: Option<f64>,
    /// Best ask.
    pub ask: Option<f64>,
    /// Session volume.
    pub volume: Option<f64>,
    /// Prior close.
    pub close: Option<f64>,
}

/// Normalize an upstream number: NaN, infinities, and negatives become `None`.
#[must_use]
pub fn sanitize(value: Option<f64>) -> Option<Decimal> {
    let v = value?;
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    Decimal::from_f64(v)
}

/// Sanitized point-in-time read for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Requested symbol.
    pub symbol: String,
    /// Contract the values belong to, if one was resolved.
    pub contract: Option<ContractDescriptor>,
    /// Outcome.
    pub mode: SnapshotMode,
    /// Last trade price.
    pub last: Option<Decimal>,
    /// Best bid.
    pub bid: Option<Decimal>,
    /// Best ask.
    pub ask: Option<Decimal>,
    /// Session volume.
    pub volume: Option<Decimal>,
    /// Prior close.
    pub close: Option<Decimal>,
    /// Buffer reads performed before returning.
    pub polls: u32,
}

impl Snapshot {
    /// Empty snapshot for a symbol with no resolvable contract.
    #[must_use]
    pub fn no_contract(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            contract: None,
            mode: SnapshotMode::NoContract,
            last: None,
            bid: None,
            ask: None,
            volume: None,
            close: None,
            polls: 0,
        }
    }

    /// Build a sanitized snapshot from raw buffer values.
    #[must_use]
    pub fn from_raw(
        symbol: impl Into<String>,
        contract: ContractDescriptor,
        raw: RawQuote,
        mode: SnapshotMode,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            contract: Some(contract),
            mode,
            last: sanitize(raw.last),
            bid: sanitize(raw.bid),
            ask: sanitize(raw.ask),
            volume: sanitize(raw.volume),
            close: sanitize(raw.close),
            polls: 0,
        }
    }

    /// Set the poll count.
    #[must_use]
    pub const fn with_polls(mut self, polls: u32) -> Self {
        self.polls = polls;
        self
    }

    /// A snapshot is usable once it has a last price or both sides of the
    /// quote.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.last.is_some() || (self.bid.is_some() && self.ask.is_some())
    }

    /// Mid price, when both sides are present.
    #[must_use]
    pub fn mid(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Ask minus bid, when both sides are present.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Best available price: last, then mid, then prior close.
    #[must_use]
    pub fn best_price(&self) -> Option<Decimal> {
        self.last.or_else(|| self.mid()).or(self.close)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::contract::ExpiryKey;

    fn contract() -> ContractDescriptor {
        ContractDescriptor::new("ES", "CME", ExpiryKey::parse("20250321").unwrap(), "1")
    }

    fn snap(raw: RawQuote) -> Snapshot {
        Snapshot::from_raw("ES", contract(), raw, SnapshotMode::Timeout)
    }

    #[test]
    fn bid_and_ask_without_last_is_usable() {
        let s = snap(RawQuote {
            bid: Some(100.0),
            ask: Some(100.25),
            ..RawQuote::default()
        });
        assert!(s.last.is_none());
        assert!(s.is_usable());
        assert_eq!(s.mid(), Some(dec!(100.125)));
        assert_eq!(s.spread(), Some(dec!(0.25)));
    }

    #[test]
    fn all_empty_is_not_usable() {
        let s = snap(RawQuote::default());
        assert!(!s.is_usable());
        assert_eq!(s.best_price(), None);
    }

    #[test]
    fn one_sided_quote_is_not_usable() {
        let s = snap(RawQuote {
            bid: Some(100.0),
            ask: Some(f64::NAN),
            ..RawQuote::default()
        });
        assert!(!s.is_usable());
    }

    #[test]
    fn nan_and_negative_become_none() {
        assert_eq!(sanitize(Some(f64::NAN)), None);
        assert_eq!(sanitize(Some(f64::INFINITY)), None);
        assert_eq!(sanitize(Some(-1.0)), None);
        assert_eq!(sanitize(None), None);
        assert_eq!(sanitize(Some(0.0)), Some(Decimal::ZERO));
    }

    #[test]
    fn best_price_prefers_last_then_mid_then_close() {
        let full = snap(RawQuote {
            last: Some(5300.5),
            bid: Some(5300.0),
            ask: Some(5300.25),
            close: Some(5290.0),
            ..RawQuote::default()
        });
        assert_eq!(full.best_price(), Some(dec!(5300.5)));

        let quoted = snap(RawQuote {
            bid: Some(5300.0),
            ask: Some(5300.5),
            close: Some(5290.0),
            ..RawQuote::default()
        });
        assert_eq!(quoted.best_price(), Some(dec!(5300.25)));

        let closed = snap(RawQuote {
            close: Some(5290.0),
            ..RawQuote::default()
        });
        assert_eq!(closed.best_price(), Some(dec!(5290)));
    }

    #[test]
    fn no_contract_has_no_fields() {
        let s = Snapshot::no_contract("NQ");
        assert_eq!(s.mode, SnapshotMode::NoContract);
        assert!(s.contract.is_none());
        assert!(!s.is_usable());
    }

    #[test]
    fn mode_serializes_snake_case() {
        let json = serde_json::to_string(&SnapshotMode::NoContract).unwrap();
        assert_eq!(json, "\"no_contract\"");
    }

    proptest! {
        #[test]
        fn sanitize_never_yields_negative(v in proptest::num::f64::ANY) {
            if let Some(d) = sanitize(Some(v)) {
                prop_assert!(d >= Decimal::ZERO);
            }
        }

        #[test]
        fn sanitize_keeps_finite_non_negative(v in 0.0f64..1.0e9) {
            prop_assert!(sanitize(Some(v)).is_some());
        }
    }
}
