//! Analysis run module - the persisted audit lifecycle

use crate::finding::Finding;
use crate::ids::{DocumentId, OwnerId, RunId};
use crate::tier::Tier;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an analysis run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created but blocked on entitlement; recoverable via payment
    PendingPayment,

    /// Entitled and eligible for execution
    Running,

    /// Executed; findings and summary are populated
    Done,

    /// A failure was captured into the run's error field
    Error,
}

impl RunStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::PendingPayment => "pending_payment",
            RunStatus::Running => "running",
            RunStatus::Done => "done",
            RunStatus::Error => "error",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(RunStatus::PendingPayment),
            "running" => Some(RunStatus::Running),
            "done" => Some(RunStatus::Done),
            "error" => Some(RunStatus::Error),
            _ => None,
        }
    }
}

/// Scan statistics recorded after an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Chunks read from the store
    pub chunks_scanned: usize,

    /// Findings produced (including suppressed ones)
    pub findings: usize,

    /// Findings whose claim text was replaced by the safety filter
    pub suppressed: usize,
}

/// The run's mutable meta bag
///
/// `paid` and `tier` may be flipped at any time by the payment webhook,
/// independent of run status; the entitlement resolver reads them on the
/// next execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    /// Entitlement tier for this run
    pub tier: Tier,

    /// Whether payment has been reconciled
    pub paid: bool,

    /// Whether export is allowed at the resolved tier
    pub export_allowed: bool,

    /// Findings from the most recent execution
    pub findings: Vec<Finding>,

    /// Stats from the most recent execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<RunStats>,

    /// Captured failure message when status is `Error`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Last payment event id applied, for webhook idempotency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_payment_event: Option<String>,
}

impl Default for RunMeta {
    fn default() -> Self {
        Self {
            tier: Tier::Basic,
            paid: false,
            export_allowed: false,
            findings: Vec::new(),
            stats: None,
            error: None,
            last_payment_event: None,
        }
    }
}

/// A persisted audit attempt over one document
///
/// Runs are created once per audit attempt, mutated by
/// materialize/execute/payment-webhook, and never deleted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    /// Unique identifier
    pub id: RunId,

    /// Owning principal
    pub owner: OwnerId,

    /// Target document
    pub document_id: DocumentId,

    /// Lifecycle state
    pub status: RunStatus,

    /// Tier, payment, findings, stats, error
    pub meta: RunMeta,

    /// Human-readable summary written on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Creation time (epoch seconds)
    pub created_at: u64,

    /// Last mutation time (epoch seconds)
    pub updated_at: u64,
}

impl AnalysisRun {
    /// Create a new run in the given initial status
    pub fn new(
        owner: OwnerId,
        document_id: DocumentId,
        status: RunStatus,
        tier: Tier,
        now: u64,
    ) -> Self {
        Self {
            id: RunId::new(),
            owner,
            document_id,
            status,
            meta: RunMeta {
                tier,
                ..RunMeta::default()
            },
            summary: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Capture a failure: set status to `Error` and persist the message
    pub fn fail(&mut self, message: impl Into<String>, now: u64) {
        self.status = RunStatus::Error;
        self.meta.error = Some(message.into());
        self.updated_at = now;
    }

    /// Apply a reconciled payment event; returns whether state changed
    ///
    /// Idempotent: a repeated event id is a no-op, and on an already-paid
    /// run only a tier upgrade (basic → pro) has any effect. Never touches
    /// run status - the entitlement resolver reads `paid`/`tier` on the
    /// next execute.
    pub fn apply_payment(&mut self, tier: Tier, event_id: &str, now: u64) -> bool {
        if self.meta.last_payment_event.as_deref() == Some(event_id) {
            return false;
        }
        if self.meta.paid && tier <= self.meta.tier {
            return false;
        }

        self.meta.paid = true;
        self.meta.tier = tier.max(self.meta.tier);
        self.meta.export_allowed = self.meta.tier.allows_export();
        self.meta.last_payment_event = Some(event_id.to_string());
        self.updated_at = now;
        true
    }
}
