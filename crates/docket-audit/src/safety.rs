//! Safety-phrasing filter
//!
//! Every claim passes through this lexicon guard before a finding is
//! finalized. The engine is a research tool: language implying guilt,
//! fabrication, concealment, bias, or unlawful conduct never leaves it.
//! A rejected claim is replaced by a fixed placeholder and the finding's
//! meta records the suppression; suppressed findings still count against
//! caps so suppression stays visible to the caller.

use regex::Regex;
use std::sync::LazyLock;

/// Placeholder substituted for a claim the lexicon rejected
pub const SUPPRESSED_CLAIM_TEXT: &str =
    "Claim text withheld by safety filter. Review the cited excerpts directly.";

/// Reason code recorded when the lexicon rejects a claim
pub const SUPPRESSION_REASON_LEXICON: &str = "banned_lexicon";

static BANNED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)\b(?:
            guilt | guilty |
            fraud | fraudulent |
            forgery | forged |
            fabricat\w* | falsif\w* |
            conceal\w* | collusion | collud\w* |
            perjur\w* |
            unlawful | illegal | criminal | culpab\w* |
            deceit\w* | decept\w* |
            bias | biased |
            corrupt\w* | malicious |
            negligen\w* | liable | liability
        )\b",
    )
    .expect("banned lexicon compiles")
});

/// The lexicon guard applied to every draft claim
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyFilter;

impl SafetyFilter {
    /// The standard filter
    pub fn standard() -> Self {
        Self
    }

    /// Whether the text contains banned vocabulary
    pub fn is_banned(&self, text: &str) -> bool {
        BANNED.is_match(text)
    }

    /// Filter a draft claim
    ///
    /// Returns the claim unchanged, or the placeholder plus a reason code
    /// when the lexicon rejects it.
    pub fn apply(&self, draft: &str) -> FilteredClaim {
        if self.is_banned(draft) {
            FilteredClaim {
                claim: SUPPRESSED_CLAIM_TEXT.to_string(),
                suppression_reason: Some(SUPPRESSION_REASON_LEXICON.to_string()),
            }
        } else {
            FilteredClaim {
                claim: draft.to_string(),
                suppression_reason: None,
            }
        }
    }
}

/// Outcome of filtering one draft claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredClaim {
    /// The text to publish
    pub claim: String,

    /// Set when the draft was rejected
    pub suppression_reason: Option<String>,
}

impl FilteredClaim {
    /// Whether the draft was rejected
    pub fn suppressed(&self) -> bool {
        self.suppression_reason.is_some()
    }
}
