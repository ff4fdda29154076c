//! Streaming Snapshot Client
//!
//! Turns the upstream's push-updated quote buffer into a single bounded
//! call. For each symbol:
//!
//! 1. Resolve the front-month contract. Failure returns `no_contract`.
//! 2. Make sure the live subscription serves that contract. A changed
//!    contract supersedes the old subscription and cancels it upstream.
//! 3. Poll the buffer every `poll_interval`, at most
//!    `max_wait / poll_interval` times, returning `live` on the first usable
//!    read and `timeout` otherwise.
//!
//! The poll loop is the only suspension point; no tasks are spawned.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::contract_resolver::ContractResolver;
use crate::application::ports::{ClockPort, MarketDataError, MarketDataPort, QuoteBuffer};
use crate::domain::contract::ContractDescriptor;
use crate::domain::snapshot::{RawQuote, Snapshot, SnapshotMode};
use crate::domain::subscription::Subscription;
use crate::infrastructure::metrics::{record_snapshot, record_subscription_superseded};

/// Default maximum wait for a usable snapshot.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(6);

/// Default interval between buffer reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Wait bounds for one snapshot call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRequest {
    /// Upper bound on the total wait.
    pub max_wait: Duration,
    /// Interval between buffer reads.
    pub poll_interval: Duration,
}

impl Default for SnapshotRequest {
    fn default() -> Self {
        Self {
            max_wait: DEFAULT_MAX_WAIT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SnapshotRequest {
    /// Create a request with explicit bounds.
    #[must_use]
    pub const fn new(max_wait: Duration, poll_interval: Duration) -> Self {
        Self {
            max_wait,
            poll_interval,
        }
    }

    /// Set the maximum wait.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Delay before each read: the poll interval, capped at `max_wait`.
    #[must_use]
    pub fn step(&self) -> Duration {
        self.poll_interval.min(self.max_wait)
    }

    /// Number of buffer reads: `floor(max_wait / poll_interval)`, at least 1.
    #[must_use]
    pub fn iterations(&self) -> u32 {
        if self.poll_interval.is_zero() {
            return 1;
        }
        let n = self.max_wait.as_nanos() / self.poll_interval.as_nanos();
        u32::try_from(n).unwrap_or(u32::MAX).max(1)
    }
}

/// The live subscription for one symbol and its buffer.
struct ActiveFeed {
    subscription: Subscription,
    buffer: Arc<dyn QuoteBuffer>,
}

/// Bounded, non-blocking snapshot access over a streaming feed.
pub struct SnapshotClient {
    resolver: Arc<ContractResolver>,
    market_data: Arc<dyn MarketDataPort>,
    clock: Arc<dyn ClockPort>,
    feeds: RwLock<HashMap<String, ActiveFeed>>,
    shutdown: Option<CancellationToken>,
}

impl std::fmt::Debug for SnapshotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotClient")
            .field("resolver", &self.resolver)
            .field("active_feeds", &self.feeds.read().len())
            .finish_non_exhaustive()
    }
}

impl SnapshotClient {
    /// Create a client over a resolver and the shared market-data session.
    #[must_use]
    pub fn new(
        resolver: Arc<ContractResolver>,
        market_data: Arc<dyn MarketDataPort>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            resolver,
            market_data,
            clock,
            feeds: RwLock::new(HashMap::new()),
            shutdown: None,
        }
    }

    /// Stop waiting early when `token` is cancelled.
    #[must_use]
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = Some(token);
        self
    }

    /// Snapshot with default bounds (6 s wait, 100 ms polls).
    pub async fn get_snapshot(&self, symbol: &str) -> Snapshot {
        self.get_snapshot_with(symbol, SnapshotRequest::default())
            .await
    }

    /// Snapshot with explicit bounds.
    ///
    /// Never fails: the outcome is carried in [`Snapshot::mode`].
    pub async fn get_snapshot_with(&self, symbol: &str, request: SnapshotRequest) -> Snapshot {
        let contract = match self.resolver.resolve(symbol).await {
            Ok(contract) => contract,
            Err(e) => {
                tracing::info!(symbol, error = %e, "No contract, returning empty snapshot");
                record_snapshot(SnapshotMode::NoContract);
                return Snapshot::no_contract(symbol);
            }
        };

        let buffer = match self.ensure_subscription(symbol, &contract).await {
            Ok(buffer) => buffer,
            Err(e) => {
                tracing::warn!(symbol, contract = %contract, error = %e, "Market data request failed");
                record_snapshot(SnapshotMode::Timeout);
                return Snapshot::from_raw(symbol, contract, RawQuote::default(), SnapshotMode::Timeout);
            }
        };

        let snapshot = self.poll(symbol, contract, buffer.as_ref(), request).await;
        record_snapshot(snapshot.mode);
        snapshot
    }

    async fn poll(
        &self,
        symbol: &str,
        contract: ContractDescriptor,
        buffer: &dyn QuoteBuffer,
        request: SnapshotRequest,
    ) -> Snapshot {
        let iterations = request.iterations();
        let started = Instant::now();
        let mut latest = RawQuote::default();
        let mut polls = 0u32;

        for attempt in 1..=iterations {
            if !self.sleep(request.step()).await {
                tracing::debug!(symbol, attempt, "Snapshot wait cancelled by shutdown");
                break;
            }

            latest = buffer.latest();
            polls = attempt;

            let snapshot = Snapshot::from_raw(symbol, contract.clone(), latest, SnapshotMode::Live);
            if snapshot.is_usable() {
                tracing::debug!(symbol, attempt, "Usable snapshot observed");
                return snapshot.with_polls(polls);
            }

            if started.elapsed() >= request.max_wait {
                break;
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        let waited_ms = started.elapsed().as_millis() as u64;
        tracing::debug!(symbol, polls, waited_ms, "Snapshot wait exhausted");

        Snapshot::from_raw(symbol, contract, latest, SnapshotMode::Timeout).with_polls(polls)
    }

    /// Sleep one poll interval. Returns `false` if shutdown fired first.
    async fn sleep(&self, interval: Duration) -> bool {
        match &self.shutdown {
            Some(token) => {
                tokio::select! {
                    () = tokio::time::sleep(interval) => true,
                    () = token.cancelled() => false,
                }
            }
            None => {
                tokio::time::sleep(interval).await;
                true
            }
        }
    }

    /// Return the buffer for `contract`, subscribing if the current
    /// subscription is absent or serves a different contract.
    async fn ensure_subscription(
        &self,
        symbol: &str,
        contract: &ContractDescriptor,
    ) -> Result<Arc<dyn QuoteBuffer>, MarketDataError> {
        {
            let feeds = self.feeds.read();
            if let Some(feed) = feeds.get(symbol)
                && feed.subscription.serves(contract)
            {
                return Ok(Arc::clone(&feed.buffer));
            }
        }

        let buffer = self.market_data.request_market_data(contract).await?;
        let subscription = Subscription::new(contract.clone(), self.clock.now());
        tracing::info!(
            symbol,
            contract = %contract,
            subscription_id = %subscription.id(),
            "Subscribed to market data"
        );

        let previous = self.feeds.write().insert(
            symbol.to_string(),
            ActiveFeed {
                subscription,
                buffer: Arc::clone(&buffer),
            },
        );

        if let Some(old) = previous
            && old.subscription.contract() != contract
        {
            self.retire(symbol, old.subscription).await;
        }

        Ok(buffer)
    }

    /// Supersede a subscription and cancel it upstream.
    async fn retire(&self, symbol: &str, mut subscription: Subscription) {
        if !subscription.supersede(self.clock.now()) {
            return;
        }
        record_subscription_superseded();
        tracing::info!(
            symbol,
            subscription_id = %subscription.id(),
            contract = %subscription.contract(),
            "Superseded market data subscription"
        );

        if let Err(e) = self
            .market_data
            .cancel_market_data(subscription.contract())
            .await
        {
            tracing::warn!(
                symbol,
                subscription_id = %subscription.id(),
                error = %e,
                "Failed to cancel superseded subscription"
            );
        }
    }

    /// Tear down the live subscription for `symbol`, if any.
    ///
    /// Returns whether one was active.
    pub async fn release(&self, symbol: &str) -> bool {
        let removed = self.feeds.write().remove(symbol);
        match removed {
            Some(feed) => {
                self.retire(symbol, feed.subscription).await;
                true
            }
            None => false,
        }
    }

    /// The live subscription for `symbol`, if any.
    #[must_use]
    pub fn active_subscription(&self, symbol: &str) -> Option<Subscription> {
        self.feeds
            .read()
            .get(symbol)
            .map(|feed| feed.subscription.clone())
    }
}

// =============================================================================
// Tests
// =============================================================================
