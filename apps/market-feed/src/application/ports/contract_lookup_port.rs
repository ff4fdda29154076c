//! Contract Lookup Port (Driven Port)
//!
//! Interface onto the broker's contract-metadata request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One listed instance of a symbol as reported by the upstream.
///
/// The expiry key is kept raw; the resolver parses and orders it. No ordering
/// of candidates is guaranteed by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCandidate {
    /// Symbol root.
    pub symbol: String,
    /// Listing exchange.
    pub exchange: String,
    /// Expiry key as reported (`YYYYMMDD` or `YYYYMM`).
    pub expiry: String,
    /// Opaque upstream identifier.
    pub upstream_id: String,
}

impl ContractCandidate {
    /// Create a new candidate.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        exchange: impl Into<String>,
        expiry: impl Into<String>,
        upstream_id: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: exchange.into(),
            expiry: expiry.into(),
            upstream_id: upstream_id.into(),
        }
    }
}

/// Contract lookup error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContractLookupError {
    /// The upstream session could not serve the request.
    #[error("Contract lookup unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// The upstream rejected the request.
    #[error("Contract lookup rejected: {message}")]
    Rejected {
        /// Error details.
        message: String,
    },
}

/// Port for listing tradable instances of a symbol.
#[async_trait]
pub trait ContractLookupPort: Send + Sync {
    /// List every tradable instance of `symbol` on `exchange`.
    ///
    /// An empty list is a valid answer and means nothing is listed.
    async fn list_contracts(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<Vec<ContractCandidate>, ContractLookupError>;
}
