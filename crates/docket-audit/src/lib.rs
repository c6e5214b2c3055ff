//! Docket Audit Engine
//!
//! Deterministic, research-only consistency scanning over ordered document
//! chunks. The engine runs a closed registry of category detectors over each
//! chunk, scores and deduplicates hits, derives confidence and severity,
//! extracts bounded evidence excerpts, and passes every claim through a
//! safety-phrasing filter before a finding is finalized.
//!
//! The engine never does natural-language understanding and never emits
//! accusatory or legal-conclusion language: categories and detectors are
//! data, and claims that trip the banned lexicon are replaced by a fixed
//! placeholder with the suppression recorded in the finding's meta.
//!
//! # Examples
//!
//! ```
//! use docket_audit::{Engine, EngineOptions};
//!
//! let engine = Engine::new(EngineOptions::default());
//! let outcome = engine.scan(&[]);
//! ```

#![warn(missing_docs)]

mod engine;
mod options;
mod registry;
mod safety;

pub use engine::{AuditOutcome, Engine, ScanStats};
pub use options::EngineOptions;
pub use registry::{CategorySpec, Detector, Registry};
pub use safety::{SafetyFilter, SUPPRESSED_CLAIM_TEXT, SUPPRESSION_REASON_LEXICON};
