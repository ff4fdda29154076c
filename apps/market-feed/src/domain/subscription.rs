//! Market-data subscription state.
//!
//! The snapshot client holds at most one live subscription per symbol. When
//! the resolved contract changes, the old subscription is superseded
//! explicitly instead of being left to dangle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::contract::ContractDescriptor;

/// Unique identifier for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generate a new random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An outstanding request for updates on one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: SubscriptionId,
    contract: ContractDescriptor,
    active: bool,
    created_at: DateTime<Utc>,
    superseded_at: Option<DateTime<Utc>>,
}

impl Subscription {
    /// Open a subscription record for `contract`.
    #[must_use]
    pub fn new(contract: ContractDescriptor, created_at: DateTime<Utc>) -> Self {
        Self {
            id: SubscriptionId::new(),
            contract,
            active: true,
            created_at,
            superseded_at: None,
        }
    }

    /// Subscription identifier.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Contract this subscription is for.
    #[must_use]
    pub const fn contract(&self) -> &ContractDescriptor {
        &self.contract
    }

    /// Whether the subscription is still the live one for its symbol.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// When the subscription was opened.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the subscription was superseded, if it was.
    #[must_use]
    pub const fn superseded_at(&self) -> Option<DateTime<Utc>> {
        self.superseded_at
    }

    /// Whether this subscription serves `contract`.
    #[must_use]
    pub fn serves(&self, contract: &ContractDescriptor) -> bool {
        self.active && &self.contract == contract
    }

    /// Mark this subscription as replaced.
    ///
    /// Returns `false` if it was already inactive, so callers tear down the
    /// upstream side exactly once.
    pub fn supersede(&mut self, at: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.superseded_at = Some(at);
        true
    }
}
