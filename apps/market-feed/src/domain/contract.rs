//! Contract descriptors and the per-symbol cache entry.
//!
//! A futures symbol (e.g. `ES`) has several listed instances that differ by
//! expiry. The expiry key is the only thing the resolver needs to order them
//! and compare against today, so it is parsed once into a calendar date.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Expiry Key
// =============================================================================

/// Error returned when an expiry key cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid expiry key '{raw}': {reason}")]
pub struct ExpiryKeyError {
    /// The rejected input.
    pub raw: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// Sortable expiry of a contract instance.
///
/// Accepts `YYYYMMDD` or `YYYYMM`. A month-only key means the last calendar
/// day of that month. Anything after the first whitespace is ignored, since
/// some upstreams append a session time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExpiryKey {
    date: NaiveDate,
    raw: String,
}

impl ExpiryKey {
    /// Parse an upstream expiry key.
    ///
    /// # Errors
    ///
    /// Returns `ExpiryKeyError` if the key is not 6 or 8 ASCII digits or does
    /// not name a real calendar date.
    pub fn parse(raw: &str) -> Result<Self, ExpiryKeyError> {
        let token = raw.split_whitespace().next().unwrap_or_default();
        let err = |reason| ExpiryKeyError {
            raw: raw.to_string(),
            reason,
        };

        if !token.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err("expected digits only"));
        }

        let year: i32 = token
            .get(0..4)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| err("missing year"))?;
        let month: u32 = token
            .get(4..6)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| err("missing month"))?;

        let date = match token.len() {
            8 => {
                let day: u32 = token
                    .get(6..8)
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(|| err("missing day"))?;
                NaiveDate::from_ymd_opt(year, month, day)
            }
            6 => last_day_of_month(year, month),
            _ => return Err(err("expected YYYYMMDD or YYYYMM")),
        }
        .ok_or_else(|| err("not a calendar date"))?;

        Ok(Self {
            date,
            raw: token.to_string(),
        })
    }

    /// Calendar date of expiry.
    #[must_use]
    pub const fn date(&self) -> NaiveDate {
        self.date
    }

    /// The key as received (whitespace suffix removed).
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whole days from `today` until expiry. Negative once expired.
    #[must_use]
    pub fn days_until(&self, today: NaiveDate) -> i64 {
        (self.date - today).num_days()
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next.and_then(|d| d.pred_opt())
}

impl fmt::Display for ExpiryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl TryFrom<String> for ExpiryKey {
    type Error = ExpiryKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ExpiryKey> for String {
    fn from(key: ExpiryKey) -> Self {
        key.raw
    }
}

// =============================================================================
// Contract Descriptor
// =============================================================================

/// A specific tradable instance of a symbol. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractDescriptor {
    /// Symbol root (e.g. `ES`).
    pub symbol: String,
    /// Listing exchange (e.g. `CME`).
    pub exchange: String,
    /// Expiry key.
    pub expiry: ExpiryKey,
    /// Opaque identifier assigned by the upstream.
    pub upstream_id: String,
}

impl ContractDescriptor {
    /// Create a new descriptor.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        expiry: ExpiryKey,
        upstream_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            expiry,
            upstream_id: upstream_id.into(),
        }
    }

    /// Whether the contract expires today or later.
    #[must_use]
    pub fn is_listed_on(&self, today: NaiveDate) -> bool {
        self.expiry.date() >= today
    }
}

impl fmt::Display for ContractDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} {} ({})",
            self.symbol, self.exchange, self.expiry, self.upstream_id
        )
    }
}

// =============================================================================
// Cache Entry
// =============================================================================

/// Why a cache entry may no longer be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// Entry is older than the configured TTL.
    TtlExpired,
    /// Contract expiry is within the rollover-proximity window.
    RolloverWindow,
}

impl StaleReason {
    /// Label used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TtlExpired => "ttl_expired",
            Self::RolloverWindow => "rollover_window",
        }
    }
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved descriptor plus the time it was resolved.
///
/// Replaced wholesale on refresh, never mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCacheEntry {
    descriptor: ContractDescriptor,
    resolved_at: DateTime<Utc>,
}

impl ContractCacheEntry {
    /// Stamp a descriptor with its resolution time.
    #[must_use]
    pub const fn new(descriptor: ContractDescriptor, resolved_at: DateTime<Utc>) -> Self {
        Self {
            descriptor,
            resolved_at,
        }
    }

    /// The cached descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &ContractDescriptor {
        &self.descriptor
    }

    /// When the descriptor was resolved.
    #[must_use]
    pub const fn resolved_at(&self) -> DateTime<Utc> {
        self.resolved_at
    }

    /// Check the entry against TTL and rollover proximity.
    ///
    /// Returns `None` while the entry may still be served. A clock that moved
    /// backwards counts as zero age.
    #[must_use]
    pub fn stale_reason(
        &self,
        now: DateTime<Utc>,
        ttl: Duration,
        rollover_days: u32,
    ) -> Option<StaleReason> {
        let age = (now - self.resolved_at).to_std().unwrap_or(Duration::ZERO);
        if age >= ttl {
            return Some(StaleReason::TtlExpired);
        }

        let today = now.date_naive();
        if self.descriptor.expiry.days_until(today) <= i64::from(rollover_days) {
            return Some(StaleReason::RolloverWindow);
        }

        None
    }

    /// Convenience inverse of [`Self::stale_reason`].
    #[must_use]
    pub fn is_valid(&self, now: DateTime<Utc>, ttl: Duration, rollover_days: u32) -> bool {
        self.stale_reason(now, ttl, rollover_days).is_none()
    }
}

// =============================================================================
// Tests
// =============================================================================
