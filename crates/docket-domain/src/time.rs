//! Epoch-second timestamps
//!
//! All persisted timestamps are seconds since the Unix epoch, stored as u64.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as seconds since the Unix epoch
pub fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
