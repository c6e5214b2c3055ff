//! Entitlement resolution logic

use docket_domain::Tier;
use serde::{Deserialize, Serialize};

/// Who is asking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Caller {
    /// Internal automation (follow-up jobs, migrations)
    System,

    /// An end user identified by an opaque id
    EndUser {
        /// The caller's principal id
        id: String,
    },
}

impl Caller {
    /// The end-user id, if any
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Caller::System => None,
            Caller::EndUser { id } => Some(id),
        }
    }
}

/// Stored profile flags for the calling principal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFlags {
    /// Administrator flag on the stored profile
    pub is_admin: bool,

    /// Free-access grant on the stored profile
    pub free_access: bool,

    /// Tier granted with free access; `basic` when unspecified
    pub free_tier: Option<Tier>,
}

/// Everything the resolver looks at for one decision
#[derive(Debug, Clone)]
pub struct EntitlementRequest<'a> {
    /// Calling principal
    pub caller: &'a Caller,

    /// Stored profile flags for the caller (ignored for system callers)
    pub profile: ProfileFlags,

    /// Administrator allow-list (user ids)
    pub admin_allowlist: &'a [String],

    /// The run's reconciled payment flag
    pub paid: bool,

    /// The run's stored tier
    pub tier: Tier,
}

/// Which rule produced the decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Rule 1: system caller
    SystemCaller,

    /// Rule 2: administrator
    Administrator,

    /// Rule 3: stored free-access grant
    FreeGrant,

    /// Rule 4: run is paid
    Paid,

    /// Rule 4 fallthrough: not paid; recoverable, not a fault
    PaymentRequired,
}

/// The resolved entitlement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether execution/viewing is permitted
    pub allowed: bool,

    /// Resolved tier
    pub tier: Tier,

    /// Whether export is permitted at the resolved tier
    pub export_allowed: bool,

    /// Which rule fired
    pub reason: DecisionReason,
}

/// Resolve an entitlement request; first match wins
pub fn resolve(request: &EntitlementRequest<'_>) -> Decision {
    if matches!(request.caller, Caller::System) {
        return Decision {
            allowed: true,
            tier: request.tier,
            export_allowed: request.tier.allows_export(),
            reason: DecisionReason::SystemCaller,
        };
    }

    let allowlisted = request
        .caller
        .user_id()
        .map(|id| request.admin_allowlist.iter().any(|a| a == id))
        .unwrap_or(false);
    if allowlisted || request.profile.is_admin {
        return Decision {
            allowed: true,
            tier: Tier::Pro,
            export_allowed: true,
            reason: DecisionReason::Administrator,
        };
    }

    if request.profile.free_access {
        let tier = request.profile.free_tier.unwrap_or_default();
        return Decision {
            allowed: true,
            tier,
            export_allowed: tier.allows_export(),
            reason: DecisionReason::FreeGrant,
        };
    }

    if request.paid {
        return Decision {
            allowed: true,
            tier: request.tier,
            export_allowed: request.tier.allows_export(),
            reason: DecisionReason::Paid,
        };
    }

    Decision {
        allowed: false,
        tier: request.tier,
        export_allowed: false,
        reason: DecisionReason::PaymentRequired,
    }
}
