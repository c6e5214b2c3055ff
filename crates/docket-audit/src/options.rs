//! Engine options

use serde::{Deserialize, Serialize};

/// Caps and thresholds for one audit scan
///
/// The engine has no cancellation signal; these caps are what guarantee it
/// always terminates quickly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Hard cap on total findings; scanning stops immediately once reached
    pub max_findings: usize,

    /// Cap on findings per category across the whole scan
    pub max_findings_per_category: usize,

    /// Evidence excerpts kept per finding (top matches by weight)
    pub max_evidence_per_finding: usize,

    /// Excerpt window size in characters, centered on the match
    pub excerpt_max_chars: usize,

    /// Minimum summed detector weight for a chunk/category pair to yield a finding
    pub min_score: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_findings: 50,
            max_findings_per_category: 10,
            max_evidence_per_finding: 3,
            excerpt_max_chars: 240,
            min_score: 2,
        }
    }
}

impl EngineOptions {
    /// Validate the options
    pub fn validate(&self) -> Result<(), String> {
        if self.max_findings == 0 {
            return Err("max_findings must be greater than 0".to_string());
        }
        if self.max_findings_per_category == 0 {
            return Err("max_findings_per_category must be greater than 0".to_string());
        }
        if self.excerpt_max_chars == 0 {
            return Err("excerpt_max_chars must be greater than 0".to_string());
        }
        Ok(())
    }
}
