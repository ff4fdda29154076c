//! Contract Resolver Service
//!
//! Resolves a symbol to its front-month contract, caching the result per
//! symbol. A cache entry is served until its TTL elapses or its expiry
//! enters the rollover-proximity window, whichever comes first.
//!
//! # Selection
//!
//! 1. List every instance of the symbol on the configured exchange.
//! 2. Drop instances whose expiry key cannot be parsed.
//! 3. Sort ascending by expiry and take the first expiring today or later.
//! 4. If every instance is past-dated, take the latest one and warn.
//!
//! An empty listing is `NotFound`; nothing is ever synthesized.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use parking_lot::RwLock;
use thiserror::Error;

use crate::application::ports::{
    ClockPort, ContractCandidate, ContractLookupError, ContractLookupPort,
};
use crate::domain::contract::{ContractCacheEntry, ContractDescriptor, ExpiryKey};
use crate::infrastructure::metrics::{ResolutionOutcome, record_contract_resolution};

/// Default exchange for futures lookups.
pub const DEFAULT_EXCHANGE: &str = "CME";

/// Default cache TTL (10 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default rollover-proximity window in days.
pub const DEFAULT_ROLLOVER_DAYS: u32 = 3;

/// Resolver errors.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No tradable instance was listed.
    #[error("No tradable contract for {symbol} on {exchange}")]
    NotFound {
        /// Requested symbol.
        symbol: String,
        /// Exchange searched.
        exchange: String,
    },

    /// The lookup itself failed.
    #[error("Contract lookup failed for {symbol}: {source}")]
    Lookup {
        /// Requested symbol.
        symbol: String,
        /// Underlying port error.
        source: ContractLookupError,
    },
}

/// Resolver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Exchange passed to the lookup.
    pub exchange: String,
    /// How long a resolution may be served from cache.
    pub cache_ttl: Duration,
    /// Days before expiry at which cached entries stop being served.
    pub rollover_days: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            exchange: DEFAULT_EXCHANGE.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            rollover_days: DEFAULT_ROLLOVER_DAYS,
        }
    }
}

impl ResolverConfig {
    /// Set the exchange.
    #[must_use]
    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }

    /// Set the cache TTL.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the rollover window.
    #[must_use]
    pub const fn with_rollover_days(mut self, days: u32) -> Self {
        self.rollover_days = days;
        self
    }
}

/// Front-month resolver with a per-symbol cache.
///
/// The cache is read-mostly; concurrent refreshes for the same symbol are
/// last-writer-wins.
pub struct ContractResolver {
    lookup: Arc<dyn ContractLookupPort>,
    clock: Arc<dyn ClockPort>,
    config: ResolverConfig,
    cache: RwLock<HashMap<String, ContractCacheEntry>>,
}

impl std::fmt::Debug for ContractResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractResolver")
            .field("config", &self.config)
            .field("cached_symbols", &self.cache.read().len())
            .finish_non_exhaustive()
    }
}

impl ContractResolver {
    /// Create a resolver over the given lookup and clock.
    #[must_use]
    pub fn new(
        lookup: Arc<dyn ContractLookupPort>,
        clock: Arc<dyn ClockPort>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            lookup,
            clock,
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolver configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve `symbol` to its front-month contract.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::NotFound` if nothing usable is listed, or
    /// `ResolveError::Lookup` if the lookup fails.
    pub async fn resolve(&self, symbol: &str) -> Result<ContractDescriptor, ResolveError> {
        let now = self.clock.now();

        let cached = self.cache.read().get(symbol).cloned();
        if let Some(entry) = cached {
            match entry.stale_reason(now, self.config.cache_ttl, self.config.rollover_days) {
                None => {
                    tracing::debug!(
                        symbol,
                        contract = %entry.descriptor(),
                        "Contract cache hit"
                    );
                    record_contract_resolution(ResolutionOutcome::Hit);
                    return Ok(entry.descriptor().clone());
                }
                Some(reason) => {
                    tracing::debug!(symbol, reason = %reason, "Contract cache entry stale");
                }
            }
        }

        let candidates = match self
            .lookup
            .list_contracts(symbol, &self.config.exchange)
            .await
        {
            Ok(candidates) => candidates,
            Err(source) => {
                record_contract_resolution(ResolutionOutcome::Failed);
                return Err(ResolveError::Lookup {
                    symbol: symbol.to_string(),
                    source,
                });
            }
        };

        let descriptor = match select_front_month(
            symbol,
            &self.config.exchange,
            candidates,
            now.date_naive(),
        ) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                record_contract_resolution(ResolutionOutcome::NotFound);
                return Err(e);
            }
        };

        let resolved_at = self.clock.now();
        self.cache.write().insert(
            symbol.to_string(),
            ContractCacheEntry::new(descriptor.clone(), resolved_at),
        );
        record_contract_resolution(ResolutionOutcome::Refresh);

        tracing::info!(
            symbol,
            contract = %descriptor,
            expiry = %descriptor.expiry,
            "Resolved front-month contract"
        );

        Ok(descriptor)
    }

    /// Current cache entry for `symbol`, stale or not.
    #[must_use]
    pub fn cached(&self, symbol: &str) -> Option<ContractCacheEntry> {
        self.cache.read().get(symbol).cloned()
    }

    /// Drop the cache entry for `symbol`. Returns whether one existed.
    pub fn invalidate(&self, symbol: &str) -> bool {
        self.cache.write().remove(symbol).is_some()
    }
}

/// Pick the front-month instance out of an unordered listing.
///
/// # Errors
///
/// Returns `ResolveError::NotFound` if the listing is empty or no candidate
/// has a parseable expiry.
pub fn select_front_month(
    symbol: &str,
    exchange: &str,
    candidates: Vec<ContractCandidate>,
    today: NaiveDate,
) -> Result<ContractDescriptor, ResolveError> {
    let mut parsed: Vec<ContractDescriptor> = candidates
        .into_iter()
        .filter_map(|c| match ExpiryKey::parse(&c.expiry) {
            Ok(expiry) => {
                let listed_on = if c.exchange.is_empty() {
                    exchange.to_string()
                } else {
                    c.exchange
                };
                Some(ContractDescriptor::new(c.symbol, listed_on, expiry, c.upstream_id))
            }
            Err(e) => {
                tracing::warn!(symbol, upstream_id = %c.upstream_id, error = %e, "Ignoring contract with unparseable expiry");
                None
            }
        })
        .collect();

    parsed.sort_by(|a, b| {
        a.expiry
            .cmp(&b.expiry)
            .then_with(|| a.upstream_id.cmp(&b.upstream_id))
    });

    if let Some(front) = parsed.iter().find(|d| d.is_listed_on(today)) {
        return Ok(front.clone());
    }

    match parsed.pop() {
        Some(latest) => {
            tracing::warn!(
                symbol,
                contract = %latest,
                "All listed contracts are past-dated, falling back to latest expiry"
            );
            Ok(latest)
        }
        None => Err(ResolveError::NotFound {
            symbol: symbol.to_string(),
            exchange: exchange.to_string(),
        }),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use mockall::mock;

    use super::*;
    use crate::infrastructure::memory::ManualClock;

    mock! {
        Lookup {}

        #[async_trait]
        impl ContractLookupPort for Lookup {
            async fn list_contracts(
                &self,
                symbol: &str,
                exchange: &str,
            ) -> Result<Vec<ContractCandidate>, ContractLookupError>;
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn es(expiry: &str) -> ContractCandidate {
        ContractCandidate::new("ES", "CME", expiry, format!("es-{expiry}"))
    }

    fn listing() -> Vec<ContractCandidate> {
        vec![es("20250919"), es("20250321"), es("20250620")]
    }

    #[test]
    fn selects_earliest_unexpired() {
        let front = select_front_month("ES", "CME", listing(), ymd(2025, 3, 1)).unwrap();
        assert_eq!(front.expiry.as_str(), "20250321");
    }

    #[test]
    fn expiry_day_itself_still_counts() {
        let front = select_front_month("ES", "CME", listing(), ymd(2025, 3, 21)).unwrap();
        assert_eq!(front.expiry.as_str(), "20250321");
        let next = select_front_month("ES", "CME", listing(), ymd(2025, 3, 22)).unwrap();
        assert_eq!(next.expiry.as_str(), "20250620");
    }

    #[test]
    fn all_past_dated_falls_back_to_latest() {
        let front = select_front_month("ES", "CME", listing(), ymd(2026, 1, 1)).unwrap();
        assert_eq!(front.expiry.as_str(), "20250919");
    }

    #[test]
    fn empty_listing_is_not_found() {
        let err = select_front_month("ES", "CME", Vec::new(), ymd(2025, 3, 1)).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[test]
    fn unparseable_expiries_are_dropped() {
        let candidates = vec![es("soon"), es("20250620")];
        let front = select_front_month("ES", "CME", candidates, ymd(2025, 3, 1)).unwrap();
        assert_eq!(front.expiry.as_str(), "20250620");

        let err = select_front_month("ES", "CME", vec![es("later")], ymd(2025, 3, 1)).unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[test]
    fn empty_candidate_exchange_uses_configured() {
        let candidates = vec![ContractCandidate::new("ES", "", "20250321", "1")];
        let front = select_front_month("ES", "GLOBEX", candidates, ymd(2025, 3, 1)).unwrap();
        assert_eq!(front.exchange, "GLOBEX");
    }

    #[tokio::test]
    async fn second_resolution_within_ttl_is_cached() {
        let mut lookup = MockLookup::new();
        lookup
            .expect_list_contracts()
            .times(1)
            .returning(|_, _| Ok(listing()));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap(),
        ));
        let resolver =
            ContractResolver::new(Arc::new(lookup), clock.clone(), ResolverConfig::default());

        let first = resolver.resolve("ES").await.unwrap();
        clock.advance(Duration::from_secs(300));
        let second = resolver.resolve("ES").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn ttl_expiry_forces_lookup() {
        let mut lookup = MockLookup::new();
        lookup
            .expect_list_contracts()
            .times(2)
            .returning(|_, _| Ok(listing()));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap(),
        ));
        let resolver =
            ContractResolver::new(Arc::new(lookup), clock.clone(), ResolverConfig::default());

        resolver.resolve("ES").await.unwrap();
        clock.advance(Duration::from_secs(600));
        resolver.resolve("ES").await.unwrap();
    }

    #[tokio::test]
    async fn rollover_window_forces_lookup_inside_ttl() {
        let mut lookup = MockLookup::new();
        lookup
            .expect_list_contracts()
            .times(2)
            .returning(|_, _| Ok(listing()));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 19, 14, 0, 0).unwrap(),
        ));
        let resolver =
            ContractResolver::new(Arc::new(lookup), clock.clone(), ResolverConfig::default());

        resolver.resolve("ES").await.unwrap();
        clock.advance(Duration::from_secs(1));
        resolver.resolve("ES").await.unwrap();
    }

    #[tokio::test]
    async fn lookup_failure_is_typed_and_not_cached() {
        let mut lookup = MockLookup::new();
        lookup.expect_list_contracts().times(1).returning(|_, _| {
            Err(ContractLookupError::Unavailable {
                message: "session down".to_string(),
            })
        });
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap(),
        ));
        let resolver = ContractResolver::new(Arc::new(lookup), clock, ResolverConfig::default());

        let err = resolver.resolve("ES").await.unwrap_err();
        assert!(matches!(err, ResolveError::Lookup { .. }));
        assert!(resolver.cached("ES").is_none());
    }

    #[tokio::test]
    async fn lookup_receives_configured_exchange() {
        let mut lookup = MockLookup::new();
        lookup
            .expect_list_contracts()
            .withf(|symbol, exchange| symbol == "MES" && exchange == "GLOBEX")
            .times(1)
            .returning(|_, _| Ok(vec![ContractCandidate::new("MES", "GLOBEX", "20250321", "9")]));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 14, 0, 0).unwrap(),
        ));
        let resolver = ContractResolver::new(
            Arc::new(lookup),
            clock,
            ResolverConfig::default().with_exchange("GLOBEX"),
        );

        let contract = resolver.resolve("MES").await.unwrap();
        assert_eq!(contract.upstream_id, "9");
        assert!(resolver.invalidate("MES"));
        assert!(!resolver.invalidate("MES"));
    }
}
