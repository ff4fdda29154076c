//! Contract resolution against an in-memory listing and a manual clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use market_feed::application::ports::ContractCandidate;
use market_feed::{
    ContractResolver, ManualClock, ResolveError, ResolverConfig, StaleReason, StaticContractLookup,
};

fn es(expiry: &str) -> ContractCandidate {
    ContractCandidate::new("ES", "CME", expiry, format!("es-{expiry}"))
}

fn setup(
    year: i32,
    month: u32,
    day: u32,
) -> (ContractResolver, Arc<StaticContractLookup>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(year, month, day, 14, 0, 0).unwrap(),
    ));
    let lookup = Arc::new(StaticContractLookup::new());
    lookup.set_listing("ES", vec![es("20250620"), es("20250321"), es("20250919")]);
    let resolver = ContractResolver::new(lookup.clone(), clock.clone(), ResolverConfig::default());
    (resolver, lookup, clock)
}

#[tokio::test]
async fn repeated_resolution_within_ttl_is_served_from_cache() {
    let (resolver, lookup, clock) = setup(2025, 2, 10);

    let first = resolver.resolve("ES").await.unwrap();
    clock.advance(Duration::from_secs(120));
    let second = resolver.resolve("ES").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.expiry.date(), NaiveDate::from_ymd_opt(2025, 3, 21).unwrap());
    assert_eq!(lookup.lookup_count(), 1);
}

#[tokio::test]
async fn ttl_expiry_forces_fresh_lookup() {
    let (resolver, lookup, clock) = setup(2025, 2, 10);

    resolver.resolve("ES").await.unwrap();
    clock.advance(Duration::from_secs(600));
    resolver.resolve("ES").await.unwrap();

    assert_eq!(lookup.lookup_count(), 2);
}

#[tokio::test]
async fn rollover_window_re_resolves_then_moves_to_next_contract() {
    let (resolver, lookup, clock) = setup(2025, 3, 17);

    // Four days out: outside the default three-day window.
    let march = resolver.resolve("ES").await.unwrap();
    assert_eq!(march.upstream_id, "es-20250321");
    resolver.resolve("ES").await.unwrap();
    assert_eq!(lookup.lookup_count(), 1);

    // Two days out: an entry cached moments ago is already stale, so every
    // access looks up again even inside the TTL.
    let now = Utc.with_ymd_and_hms(2025, 3, 19, 14, 0, 0).unwrap();
    clock.set(now);
    let refreshed = resolver.resolve("ES").await.unwrap();
    assert_eq!(refreshed.upstream_id, "es-20250321");
    assert_eq!(lookup.lookup_count(), 2);

    let entry = resolver.cached("ES").unwrap();
    assert_eq!(entry.resolved_at(), now);
    assert_eq!(
        entry.stale_reason(now, Duration::from_secs(600), 3),
        Some(StaleReason::RolloverWindow)
    );

    clock.advance(Duration::from_secs(30));
    resolver.resolve("ES").await.unwrap();
    assert_eq!(lookup.lookup_count(), 3);

    // Past expiry the next quarter is the front month.
    clock.set(Utc.with_ymd_and_hms(2025, 3, 22, 14, 0, 0).unwrap());
    let june = resolver.resolve("ES").await.unwrap();
    assert_eq!(june.upstream_id, "es-20250620");
}

#[tokio::test]
async fn all_expired_falls_back_to_latest_listed() {
    let (resolver, _, _) = setup(2026, 1, 5);
    let contract = resolver.resolve("ES").await.unwrap();
    assert_eq!(contract.upstream_id, "es-20250919");
}

#[tokio::test]
async fn unknown_symbol_is_not_found_and_not_cached() {
    let (resolver, lookup, _) = setup(2025, 2, 10);

    let err = resolver.resolve("ZZ").await.unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }));
    assert!(resolver.cached("ZZ").is_none());

    resolver.resolve("ZZ").await.unwrap_err();
    assert_eq!(lookup.lookup_count(), 2);
}

#[tokio::test]
async fn lookup_failure_is_reported_and_keeps_cache_untouched() {
    let (resolver, lookup, clock) = setup(2025, 2, 10);
    resolver.resolve("ES").await.unwrap();

    lookup.set_failure(Some("gateway not connected"));
    clock.advance(Duration::from_secs(900));
    let err = resolver.resolve("ES").await.unwrap_err();
    assert!(matches!(err, ResolveError::Lookup { .. }));
    assert!(resolver.cached("ES").is_some());

    lookup.set_failure(None);
    assert!(resolver.resolve("ES").await.is_ok());
}

#[tokio::test]
async fn invalidate_drops_entry() {
    let (resolver, lookup, _) = setup(2025, 2, 10);
    resolver.resolve("ES").await.unwrap();

    assert!(resolver.invalidate("ES"));
    assert!(!resolver.invalidate("ES"));
    resolver.resolve("ES").await.unwrap();
    assert_eq!(lookup.lookup_count(), 2);
}
