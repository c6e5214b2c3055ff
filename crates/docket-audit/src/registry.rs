//! Category registry - detectors as data
//!
//! Each category owns a list of weighted pattern detectors and a neutral
//! claim template. The scan loop iterates this data; adding a detector or a
//! category's patterns never requires touching the engine.

use docket_domain::Category;
use regex::Regex;
use std::sync::LazyLock;

/// One weighted pattern detector
#[derive(Debug, Clone)]
pub struct Detector {
    /// Signal label recorded on matches (e.g. `calendar_date`)
    pub label: &'static str,

    /// The pattern to scan for
    pub pattern: Regex,

    /// Weight contributed to the category score per match
    pub weight: u32,
}

impl Detector {
    fn new(label: &'static str, pattern: &str, weight: u32) -> Self {
        Self {
            label,
            // Patterns are static literals; compilation is covered by tests.
            pattern: Regex::new(pattern).expect("detector pattern compiles"),
            weight,
        }
    }
}

/// A category plus its detectors and claim template
#[derive(Debug, Clone)]
pub struct CategorySpec {
    /// The category these detectors feed
    pub category: Category,

    /// Neutral, research-only claim template
    pub claim_template: &'static str,

    /// Detectors run over every chunk
    pub detectors: Vec<Detector>,
}

/// The closed registry of categories scanned by the engine
#[derive(Debug, Clone)]
pub struct Registry {
    specs: Vec<CategorySpec>,
}

impl Registry {
    /// Build a registry from explicit specs (test seams, narrowed scans)
    pub fn new(specs: Vec<CategorySpec>) -> Self {
        Self { specs }
    }

    /// The standard registry
    pub fn standard() -> &'static Registry {
        &STANDARD
    }

    /// The specs in scan order
    pub fn specs(&self) -> &[CategorySpec] {
        &self.specs
    }
}

static STANDARD: LazyLock<Registry> = LazyLock::new(|| {
    Registry::new(vec![
        CategorySpec {
            category: Category::Timeline,
            claim_template: "Research signal detected for timeline review. \
                Recommended: review the cited excerpts for chronology consistency.",
            detectors: vec![
                Detector::new(
                    "calendar_date",
                    r"(?i)\b(?:january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2},\s+\d{4}\b",
                    2,
                ),
                Detector::new("numeric_date", r"\b\d{1,2}/\d{1,2}/\d{2,4}\b", 2),
                Detector::new(
                    "sequence_language",
                    r"(?i)\b(?:prior to|subsequent to|thereafter|on or about)\b",
                    1,
                ),
            ],
        },
        CategorySpec {
            category: Category::Fees,
            claim_template: "Research signal detected for fee and cost language. \
                Recommended: review the cited excerpts against the fee schedule.",
            detectors: vec![
                Detector::new("currency_amount", r"\$\s?\d[\d,]*(?:\.\d{2})?", 2),
                Detector::new(
                    "fee_language",
                    r"(?i)\b(?:fees?|costs?|retainer|invoice|billing|disbursements?)\b",
                    2,
                ),
                Detector::new("rate_language", r"(?i)\bper\s+hour\b|\bhourly\s+rate\b", 1),
            ],
        },
        CategorySpec {
            category: Category::Exhibits,
            claim_template: "Research signal detected for exhibit and attachment references. \
                Recommended: review the cited excerpts against the exhibit list.",
            detectors: vec![
                Detector::new("exhibit_ref", r"(?i)\bexhibit\s+[a-z0-9]+\b", 3),
                Detector::new(
                    "attachment_ref",
                    r"(?i)\b(?:attachment|appendix|annex)\s+[a-z0-9]+\b",
                    2,
                ),
                Detector::new("incorporation", r"(?i)\bincorporated\s+by\s+reference\b", 1),
            ],
        },
        CategorySpec {
            category: Category::CaseMetadata,
            claim_template: "Research signal detected for case metadata tokens. \
                Recommended: review the cited excerpts against the docket record.",
            detectors: vec![
                Detector::new(
                    "case_number",
                    r"(?i)\b(?:case|docket|cause)\s+(?:no\.?|number)\s*[:#]?\s*[\w:-]+",
                    3,
                ),
                Detector::new(
                    "court_name",
                    r"(?i)\b(?:district|superior|circuit|appellate|supreme)\s+court\b",
                    2,
                ),
                Detector::new("filing_stamp", r"(?i)\b(?:filed|entered)\s+on\b", 1),
            ],
        },
        CategorySpec {
            category: Category::Consistency,
            claim_template: "Research signal detected for internal cross-references. \
                Recommended: review the cited excerpts for consistency across sections.",
            detectors: vec![
                Detector::new(
                    "cross_reference",
                    r"(?i)\b(?:see|cf\.)\s+(?:section|paragraph|page|exhibit)\s+\S+",
                    2,
                ),
                Detector::new(
                    "amendment_language",
                    r"(?i)\b(?:amended|restated|corrected|superseded)\b",
                    2,
                ),
                Detector::new("defined_term", r"(?i)\bhereinafter\b", 1),
            ],
        },
    ])
});
