//! Finding module - audit-engine outputs and their evidence
//!
//! The serialized finding shape is a contract boundary consumed by
//! presentation and export collaborators:
//! `{kind, category, severity, confidence, claim, evidence, meta}`.
//! Renderers must not assume any field beyond these is present.

use crate::category::Category;
use crate::ids::DocumentId;
use serde::{Deserialize, Serialize};

/// Severity of a finding
///
/// The engine's mapping is intentionally conservative: no category
/// escalates straight to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational signal
    Info,
    /// Signal worth reviewing
    Warning,
    /// Reserved for non-engine failures surfaced as findings
    Error,
}

/// Confidence derived from the detector score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// score below the medium threshold
    Low,
    /// score ≥ 3
    Medium,
    /// score ≥ 6
    High,
}

/// A chunk pointer plus a bounded excerpt substantiating a finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Document the excerpt came from
    pub document_id: DocumentId,

    /// Index of the chunk within the document
    pub chunk_index: u32,

    /// Bounded excerpt centered on the triggering match
    pub excerpt: String,
}

/// Engine-internal annotations carried alongside a finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingMeta {
    /// Summed detector weights that produced this finding
    pub score: u32,

    /// Distinct detector labels that matched
    pub signals: Vec<String>,

    /// Whether the safety filter replaced the claim text
    pub suppressed: bool,

    /// Reason code when suppressed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suppression_reason: Option<String>,
}

impl Default for FindingMeta {
    fn default() -> Self {
        Self {
            score: 0,
            signals: Vec::new(),
            suppressed: false,
            suppression_reason: None,
        }
    }
}

/// One audit-engine output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Finding kind (`pattern_signal`, `no_signal`, `engine_notice`)
    pub kind: String,

    /// Category from the closed registry
    pub category: Category,

    /// Severity (info/warning/error)
    pub severity: Severity,

    /// Confidence (low/medium/high)
    pub confidence: Confidence,

    /// Safety-filtered, research-neutral claim text
    pub claim: String,

    /// Evidence excerpts, bounded per engine options
    pub evidence: Vec<Evidence>,

    /// Score, signal labels, suppression marker
    pub meta: FindingMeta,
}

/// Kind string for pattern-scan findings
pub const KIND_PATTERN_SIGNAL: &str = "pattern_signal";

/// Kind string for explicit none-detected findings
pub const KIND_NO_SIGNAL: &str = "no_signal";

/// Kind string for engine notices substituted by the caller
pub const KIND_ENGINE_NOTICE: &str = "engine_notice";
