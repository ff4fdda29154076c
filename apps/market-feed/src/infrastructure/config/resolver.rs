//! Contract resolver settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::services::{
    DEFAULT_CACHE_TTL, DEFAULT_EXCHANGE, DEFAULT_ROLLOVER_DAYS, ResolverConfig,
};

/// Contract resolver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Exchange passed to the contract lookup.
    #[serde(default = "default_exchange")]
    pub exchange: String,
    /// Cache lifetime in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Days before expiry at which cached entries are re-resolved.
    #[serde(default = "default_rollover_days")]
    pub rollover_days: u32,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            exchange: default_exchange(),
            cache_ttl_secs: default_cache_ttl_secs(),
            rollover_days: default_rollover_days(),
        }
    }
}

impl ResolverSettings {
    /// Convert to the service configuration.
    #[must_use]
    pub fn to_resolver_config(&self) -> ResolverConfig {
        ResolverConfig::default()
            .with_exchange(self.exchange.clone())
            .with_cache_ttl(Duration::from_secs(self.cache_ttl_secs))
            .with_rollover_days(self.rollover_days)
    }
}

fn default_exchange() -> String {
    DEFAULT_EXCHANGE.to_string()
}

const fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL.as_secs()
}

const fn default_rollover_days() -> u32 {
    DEFAULT_ROLLOVER_DAYS
}
