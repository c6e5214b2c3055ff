//! Docket Run Orchestration
//!
//! The analysis-run state machine: create (entitlement decides
//! `pending_payment` vs `running`), materialize (failures are captured onto
//! the run), and execute (entitlement re-check, audit scan, findings and
//! summary persisted, `done` or `error`). Payment is applied out of band by
//! the webhook; this crate only ever reads its result.

#![warn(missing_docs)]

mod error;
mod service;

pub use error::RunError;
pub use service::{CallerContext, ExecuteOutcome, RunService};
