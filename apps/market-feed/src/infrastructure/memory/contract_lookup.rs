//! Static contract listing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{ContractCandidate, ContractLookupError, ContractLookupPort};

/// Contract lookup backed by a fixed per-symbol listing.
#[derive(Debug, Default)]
pub struct StaticContractLookup {
    listings: RwLock<HashMap<String, Vec<ContractCandidate>>>,
    failure: RwLock<Option<String>>,
    calls: AtomicUsize,
}

impl StaticContractLookup {
    /// Create an empty lookup; every symbol lists nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the listing for `symbol`.
    pub fn set_listing(&self, symbol: &str, candidates: Vec<ContractCandidate>) {
        self.listings.write().insert(symbol.to_string(), candidates);
    }

    /// Make every lookup fail with `message` until cleared with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        *self.failure.write() = message.map(str::to_string);
    }

    /// Number of lookups served (including failures).
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContractLookupPort for StaticContractLookup {
    async fn list_contracts(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<Vec<ContractCandidate>, ContractLookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.failure.read().clone() {
            return Err(ContractLookupError::Unavailable { message });
        }

        Ok(self
            .listings
            .read()
            .get(symbol)
            .map(|candidates| {
                candidates
                    .iter()
                    .filter(|c| c.exchange.is_empty() || c.exchange == exchange)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
