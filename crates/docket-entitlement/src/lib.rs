//! Docket Entitlement Resolver
//!
//! Decides, per calling principal, whether an audit execution/export is
//! permitted and at which tier. Resolution is first-match-wins:
//!
//! 1. System callers are always allowed at the run's stored tier.
//! 2. Administrators (allow-list or stored profile flag) are always allowed
//!    at `pro` with export.
//! 3. A stored free-access grant allows the granted tier (default `basic`).
//! 4. Otherwise the caller is allowed only if the run is paid, at the stored
//!    tier.
//!
//! Denial is a value, not an error: "payment required" is expected,
//! recoverable flow that callers branch on.

#![warn(missing_docs)]

mod resolver;

pub use resolver::{resolve, Caller, Decision, DecisionReason, EntitlementRequest, ProfileFlags};
