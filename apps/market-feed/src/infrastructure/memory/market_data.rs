//! In-memory market-data session.
//!
//! Buffers are keyed by the contract's upstream id and survive across
//! subscribe/cancel cycles, so values can be published before or after the
//! snapshot client subscribes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{MarketDataError, MarketDataPort, QuoteBuffer};
use crate::domain::contract::ContractDescriptor;
use crate::domain::snapshot::RawQuote;

/// A quote buffer that producers write into and the snapshot client reads.
#[derive(Debug, Default)]
pub struct SharedQuoteBuffer {
    latest: RwLock<RawQuote>,
}

impl SharedQuoteBuffer {
    /// Replace every field.
    pub fn publish(&self, quote: RawQuote) {
        *self.latest.write() = quote;
    }

    /// Update fields in place; last write wins.
    pub fn update(&self, f: impl FnOnce(&mut RawQuote)) {
        f(&mut self.latest.write());
    }
}

impl QuoteBuffer for SharedQuoteBuffer {
    fn latest(&self) -> RawQuote {
        *self.latest.read()
    }
}

/// Market-data session that serves [`SharedQuoteBuffer`]s.
#[derive(Debug, Default)]
pub struct InMemoryMarketData {
    buffers: RwLock<HashMap<String, Arc<SharedQuoteBuffer>>>,
    active: RwLock<Vec<String>>,
    cancelled: RwLock<Vec<String>>,
    requests: AtomicUsize,
    fail_requests: AtomicBool,
    fail_cancels: AtomicBool,
}

impl InMemoryMarketData {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer for `upstream_id`, created on first use.
    pub fn buffer(&self, upstream_id: &str) -> Arc<SharedQuoteBuffer> {
        if let Some(buffer) = self.buffers.read().get(upstream_id) {
            return Arc::clone(buffer);
        }
        Arc::clone(
            self.buffers
                .write()
                .entry(upstream_id.to_string())
                .or_default(),
        )
    }

    /// Publish a full quote for `upstream_id`.
    pub fn seed(&self, upstream_id: &str, quote: RawQuote) {
        self.buffer(upstream_id).publish(quote);
    }

    /// Subscription requests served so far.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Upstream ids with a live subscription.
    #[must_use]
    pub fn active(&self) -> Vec<String> {
        self.active.read().clone()
    }

    /// Upstream ids cancelled so far, in order.
    #[must_use]
    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.read().clone()
    }

    /// Make subscription requests fail.
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Make cancellations fail.
    pub fn set_fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketDataPort for InMemoryMarketData {
    async fn request_market_data(
        &self,
        contract: &ContractDescriptor,
    ) -> Result<Arc<dyn QuoteBuffer>, MarketDataError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(MarketDataError::SubscribeFailed {
                message: format!("rejected {}", contract.upstream_id),
            });
        }

        {
            let mut active = self.active.write();
            if !active.contains(&contract.upstream_id) {
                active.push(contract.upstream_id.clone());
            }
        }

        let buffer: Arc<dyn QuoteBuffer> = self.buffer(&contract.upstream_id);
        Ok(buffer)
    }

    async fn cancel_market_data(&self, contract: &ContractDescriptor) -> Result<(), MarketDataError> {
        if self.fail_cancels.load(Ordering::SeqCst) {
            return Err(MarketDataError::CancelFailed {
                message: format!("unknown ticker {}", contract.upstream_id),
            });
        }

        self.active.write().retain(|id| id != &contract.upstream_id);
        self.cancelled.write().push(contract.upstream_id.clone());
        Ok(())
    }
}
