//! Market Data Port (Driven Port)
//!
//! Interface onto the broker's streaming market-data request. A request
//! returns a buffer the upstream keeps updating in the background; the
//! snapshot client only ever reads it.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::contract::ContractDescriptor;
use crate::domain::snapshot::RawQuote;

/// Push-updated quote fields for one subscription.
///
/// Reads never block and always return the most recent value per field.
pub trait QuoteBuffer: Send + Sync {
    /// Latest raw values.
    fn latest(&self) -> RawQuote;
}

/// Market data error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MarketDataError {
    /// Subscription request failed.
    #[error("Market data subscription failed: {message}")]
    SubscribeFailed {
        /// Error details.
        message: String,
    },

    /// Cancellation request failed.
    #[error("Market data cancellation failed: {message}")]
    CancelFailed {
        /// Error details.
        message: String,
    },
}

/// Port for streaming market data on the shared upstream session.
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Start streaming updates for `contract`.
    async fn request_market_data(
        &self,
        contract: &ContractDescriptor,
    ) -> Result<Arc<dyn QuoteBuffer>, MarketDataError>;

    /// Stop streaming updates for `contract`.
    async fn cancel_market_data(&self, contract: &ContractDescriptor) -> Result<(), MarketDataError>;
}
