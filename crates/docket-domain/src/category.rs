//! Category module - the closed registry of audit categories

use serde::{Deserialize, Serialize};

/// Audit category
///
/// This set is closed: detectors are data, categories are vocabulary.
/// Adding a detector never touches the scan loop; adding a category is a
/// deliberate vocabulary change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Date-like tokens and chronology signals
    Timeline,

    /// Fee, cost, and monetary-amount language
    Fees,

    /// Exhibit and attachment references
    Exhibits,

    /// Case-metadata tokens (case numbers, court names, filing stamps)
    CaseMetadata,

    /// Internal-consistency markers (cross-references, amendments, corrections)
    Consistency,
}

impl Category {
    /// All categories, in scan order
    pub const ALL: [Category; 5] = [
        Category::Timeline,
        Category::Fees,
        Category::Exhibits,
        Category::CaseMetadata,
        Category::Consistency,
    ];

    /// Get the category name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Timeline => "timeline",
            Category::Fees => "fees",
            Category::Exhibits => "exhibits",
            Category::CaseMetadata => "case_metadata",
            Category::Consistency => "consistency",
        }
    }

    /// Parse a category from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "timeline" => Some(Category::Timeline),
            "fees" => Some(Category::Fees),
            "exhibits" => Some(Category::Exhibits),
            "case_metadata" => Some(Category::CaseMetadata),
            "consistency" => Some(Category::Consistency),
            _ => None,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::parse(c.as_str()), Some(c));
        }
        assert_eq!(Category::parse("unknown"), None);
    }
}
