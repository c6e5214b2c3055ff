//! Purchase token module - single-use payment reconciliation credentials

use crate::ids::RunId;
use crate::tier::Tier;
use serde::{Deserialize, Serialize};

/// A single-use, time-bounded credential binding a payment callback to a run
///
/// A token is valid iff unexpired and unused. Burning a token is a
/// compare-and-set in the store, never a blind update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseToken {
    /// Opaque token string handed to the payment provider
    pub token: String,

    /// The run this token pays for
    pub run_id: RunId,

    /// Tier purchased
    pub tier: Tier,

    /// Expiry (epoch seconds)
    pub expires_at: u64,

    /// Set exactly once on successful reconciliation
    pub used_at: Option<u64>,
}

impl PurchaseToken {
    /// Mint a fresh token for a run
    pub fn mint(run_id: RunId, tier: Tier, expires_at: u64) -> Self {
        Self {
            token: format!("pt_{}", uuid::Uuid::new_v4().simple()),
            run_id,
            tier,
            expires_at,
            used_at: None,
        }
    }

    /// Whether this token could still be claimed at `now`
    pub fn is_valid(&self, now: u64) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}
