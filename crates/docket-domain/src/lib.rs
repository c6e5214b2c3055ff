//! Docket Domain Layer
//!
//! This crate contains the core domain model for Docket: the entities and
//! value objects shared by the materializer, audit engine, entitlement
//! resolver, and run state machine, plus the trait seams the storage layer
//! implements.
//!
//! ## Key Concepts
//!
//! - **Document**: an ingested legal record with an immutable source descriptor
//! - **Chunk**: a bounded, ordered slice of a document's extracted text
//! - **AnalysisRun**: the persisted audit lifecycle (pending_payment → running → done/error)
//! - **Finding**: one audit output - category, severity, confidence, safety-filtered claim, evidence
//! - **PurchaseToken**: a single-use, time-bounded payment reconciliation credential
//! - **Tier**: entitlement level (basic/pro) controlling audit depth and export
//!
//! ## Architecture
//!
//! Infrastructure implementations (SQLite store, HTTP fetch, payment
//! provider) live in other crates and plug in through the traits defined in
//! [`traits`]. This crate holds no I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod category;
pub mod chunk;
pub mod document;
pub mod finding;
pub mod ids;
pub mod run;
pub mod tier;
pub mod time;
pub mod token;
pub mod traits;

// Re-exports for convenience
pub use category::Category;
pub use chunk::Chunk;
pub use document::{Document, SourceDescriptor};
pub use finding::{Confidence, Evidence, Finding, FindingMeta, Severity};
pub use ids::{DocumentId, OwnerId, RunId};
pub use run::{AnalysisRun, RunMeta, RunStats, RunStatus};
pub use tier::Tier;
pub use token::PurchaseToken;
