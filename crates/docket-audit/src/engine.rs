//! The scan loop

use crate::options::EngineOptions;
use crate::registry::{CategorySpec, Registry};
use crate::safety::SafetyFilter;
use docket_domain::finding::KIND_PATTERN_SIGNAL;
use docket_domain::{Chunk, Confidence, Evidence, Finding, FindingMeta, Severity};
use std::collections::HashMap;
use tracing::debug;

/// Score threshold for high confidence
const HIGH_CONFIDENCE_SCORE: u32 = 6;

/// Score threshold for medium confidence
const MEDIUM_CONFIDENCE_SCORE: u32 = 3;

/// Distinct signal labels listed in a claim
const MAX_SIGNALS_LISTED: usize = 4;

/// Statistics from one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Chunks the engine read
    pub chunks_scanned: usize,

    /// Raw detector matches across all chunks
    pub total_matches: usize,

    /// Findings whose claim the safety filter replaced
    pub suppressed: usize,
}

/// Result of one scan
#[derive(Debug, Clone)]
pub enum AuditOutcome {
    /// Pattern scanning ran to completion (or a cap)
    Scanned {
        /// Capped, deduplicated, safety-filtered findings
        findings: Vec<Finding>,
        /// Scan statistics
        stats: ScanStats,
    },

    /// Every chunk looked like a serialized structured payload
    ///
    /// Pattern scanning did not run: this signals that materialization did
    /// not run or produced non-text content. The caller is expected to
    /// substitute a single explanatory finding.
    Degenerate,
}

struct DetectorHit {
    label: &'static str,
    weight: u32,
    offset: usize,
}

/// The audit engine
pub struct Engine {
    options: EngineOptions,
    registry: Registry,
    filter: SafetyFilter,
}

impl Engine {
    /// Create an engine over the standard registry
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            registry: Registry::standard().clone(),
            filter: SafetyFilter::standard(),
        }
    }

    /// Replace the registry (narrowed scans, test seams)
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Scan ordered chunks and produce findings
    ///
    /// Scanning stops immediately once `max_findings` findings exist, even
    /// mid-chunk. Suppressed findings count against every cap.
    pub fn scan(&self, chunks: &[Chunk]) -> AuditOutcome {
        if !chunks.is_empty() && chunks.iter().all(|c| looks_structured(&c.content)) {
            debug!(chunks = chunks.len(), "every chunk looks structured; skipping scan");
            return AuditOutcome::Degenerate;
        }

        let mut findings = Vec::new();
        let mut stats = ScanStats::default();
        let mut per_category: HashMap<&'static str, usize> = HashMap::new();

        'chunks: for chunk in chunks {
            stats.chunks_scanned += 1;

            for spec in self.registry.specs() {
                let produced = per_category.entry(spec.category.as_str()).or_insert(0);
                if *produced >= self.options.max_findings_per_category {
                    continue;
                }

                let hits = collect_hits(spec, &chunk.content);
                if hits.is_empty() {
                    continue;
                }
                stats.total_matches += hits.len();

                let score: u32 = hits.iter().map(|h| h.weight).sum();
                if score < self.options.min_score {
                    continue;
                }

                let finding = self.build_finding(spec, chunk, hits, score);
                if finding.meta.suppressed {
                    stats.suppressed += 1;
                }
                findings.push(finding);
                *produced += 1;

                if findings.len() >= self.options.max_findings {
                    break 'chunks;
                }
            }
        }

        AuditOutcome::Scanned { findings, stats }
    }

    fn build_finding(
        &self,
        spec: &CategorySpec,
        chunk: &Chunk,
        mut hits: Vec<DetectorHit>,
        score: u32,
    ) -> Finding {
        let confidence = if score >= HIGH_CONFIDENCE_SCORE {
            Confidence::High
        } else if score >= MEDIUM_CONFIDENCE_SCORE {
            Confidence::Medium
        } else {
            Confidence::Low
        };
        let severity = match confidence {
            Confidence::High => Severity::Warning,
            _ => Severity::Info,
        };

        // Distinct labels, in first-match order.
        let mut signals: Vec<String> = Vec::new();
        for hit in &hits {
            if !signals.iter().any(|s| s == hit.label) {
                signals.push(hit.label.to_string());
            }
        }

        // Top matches by weight take the evidence slots.
        hits.sort_by(|a, b| b.weight.cmp(&a.weight).then(a.offset.cmp(&b.offset)));
        let evidence: Vec<Evidence> = hits
            .iter()
            .take(self.options.max_evidence_per_finding)
            .map(|hit| Evidence {
                document_id: chunk.document_id,
                chunk_index: chunk.index,
                excerpt: excerpt_window(&chunk.content, hit.offset, self.options.excerpt_max_chars),
            })
            .collect();

        let listed: Vec<&str> = signals
            .iter()
            .take(MAX_SIGNALS_LISTED)
            .map(String::as_str)
            .collect();
        let draft = format!("{} Signals: {}.", spec.claim_template, listed.join(", "));

        let filtered = self.filter.apply(&draft);
        let suppressed = filtered.suppressed();

        Finding {
            kind: KIND_PATTERN_SIGNAL.to_string(),
            category: spec.category,
            severity,
            confidence,
            claim: filtered.claim,
            evidence,
            meta: FindingMeta {
                score,
                signals,
                suppressed,
                suppression_reason: filtered.suppression_reason,
            },
        }
    }
}

fn collect_hits(spec: &CategorySpec, text: &str) -> Vec<DetectorHit> {
    let mut hits = Vec::new();
    for detector in &spec.detectors {
        for m in detector.pattern.find_iter(text) {
            hits.push(DetectorHit {
                label: detector.label,
                weight: detector.weight,
                offset: m.start(),
            });
        }
    }
    hits
}

/// Heuristic for serialized structured payloads: prose never starts with
/// `{` or `[`.
fn looks_structured(text: &str) -> bool {
    matches!(text.trim_start().as_bytes().first(), Some(b'{') | Some(b'['))
}

/// Extract a window of at most `max_chars` characters centered on `offset`,
/// clipped to the text bounds on char boundaries.
fn excerpt_window(text: &str, offset: usize, max_chars: usize) -> String {
    let mut anchor = offset.min(text.len());
    while !text.is_char_boundary(anchor) {
        anchor -= 1;
    }

    let half = max_chars / 2;
    let mut start = anchor;
    let mut taken_left = 0;
    for (i, _) in text[..anchor].char_indices().rev() {
        start = i;
        taken_left += 1;
        if taken_left == half {
            break;
        }
    }

    let mut end = anchor;
    let mut budget = max_chars - taken_left;
    for (i, c) in text[anchor..].char_indices() {
        if budget == 0 {
            break;
        }
        end = anchor + i + c.len_utf8();
        budget -= 1;
    }

    text[start..end].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Detector;
    use docket_domain::{Category, DocumentId};
    use regex::Regex;

    fn chunk(content: &str) -> Chunk {
        Chunk::new(DocumentId::new(), 0, content)
    }

    fn chunks(contents: &[&str]) -> Vec<Chunk> {
        let doc = DocumentId::new();
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| Chunk::new(doc, i as u32, *c))
            .collect()
    }

    fn scanned(outcome: AuditOutcome) -> (Vec<Finding>, ScanStats) {
        match outcome {
            AuditOutcome::Scanned { findings, stats } => (findings, stats),
            AuditOutcome::Degenerate => panic!("unexpected degenerate outcome"),
        }
    }

    #[test]
    fn test_scenario_three_dates_no_fees() {
        let engine = Engine::new(EngineOptions::default());
        let text = "The motion was filed on January 3, 2021. A hearing followed on \
                    February 10, 2021, and the order issued on March 22, 2021.";
        let (findings, _) = scanned(engine.scan(&[chunk(text)]));

        let timeline: Vec<_> = findings
            .iter()
            .filter(|f| f.category == Category::Timeline)
            .collect();
        assert_eq!(timeline.len(), 1);
        assert!(timeline[0].meta.score >= 6, "three dates should score high");
        assert_eq!(timeline[0].confidence, Confidence::High);
        assert_eq!(timeline[0].severity, Severity::Warning);
        assert!(timeline[0].meta.signals.contains(&"calendar_date".to_string()));

        assert!(
            !findings.iter().any(|f| f.category == Category::Fees),
            "no fee-like language, no fee finding"
        );
    }

    #[test]
    fn test_degenerate_input_short_circuits() {
        let engine = Engine::new(EngineOptions::default());
        let payload = chunks(&[
            r#"{"exhibit": "A", "filed": "January 3, 2021"}"#,
            r#"[1, 2, 3]"#,
            r#"  {"nested": true}"#,
        ]);
        assert!(matches!(engine.scan(&payload), AuditOutcome::Degenerate));
    }

    #[test]
    fn test_mixed_prose_is_not_degenerate() {
        let engine = Engine::new(EngineOptions::default());
        let mixed = chunks(&[r#"{"a": 1}"#, "Filed on January 3, 2021 with Exhibit A."]);
        let (findings, stats) = scanned(engine.scan(&mixed));
        assert!(stats.chunks_scanned == 2);
        assert!(!findings.is_empty());
    }

    #[test]
    fn test_empty_chunk_list_scans_cleanly() {
        let engine = Engine::new(EngineOptions::default());
        let (findings, stats) = scanned(engine.scan(&[]));
        assert!(findings.is_empty());
        assert_eq!(stats.chunks_scanned, 0);
    }

    #[test]
    fn test_min_score_gates_findings() {
        let mut opts = EngineOptions::default();
        opts.min_score = 3;
        let engine = Engine::new(opts);
        // A single sequence_language match scores 1: below the gate.
        let (findings, stats) = scanned(engine.scan(&[chunk("Prior to the hearing.")]));
        assert!(findings.is_empty());
        assert!(stats.total_matches >= 1, "the match itself is still counted");
    }

    #[test]
    fn test_global_cap_stops_mid_chunk() {
        let mut opts = EngineOptions::default();
        opts.max_findings = 3;
        let engine = Engine::new(opts);
        // Each chunk triggers timeline + fees + exhibits + case metadata.
        let busy = "Filed on January 3, 2021. Fees of $1,200.00 due. See Exhibit A. \
                    Case No. 2024-cv-00123 in the District Court.";
        let (findings, _) = scanned(engine.scan(&chunks(&[busy, busy, busy])));
        assert_eq!(findings.len(), 3);
    }

    #[test]
    fn test_per_category_cap() {
        let mut opts = EngineOptions::default();
        opts.max_findings_per_category = 2;
        let engine = Engine::new(opts);
        let dated = "Order entered January 3, 2021 and amended February 1, 2021.";
        let (findings, _) = scanned(engine.scan(&chunks(&[dated, dated, dated, dated])));
        let timeline = findings
            .iter()
            .filter(|f| f.category == Category::Timeline)
            .count();
        assert_eq!(timeline, 2);
    }

    #[test]
    fn test_evidence_bounded_and_centered() {
        let mut opts = EngineOptions::default();
        opts.max_evidence_per_finding = 2;
        opts.excerpt_max_chars = 40;
        let engine = Engine::new(opts);
        let padding = "lorem ipsum ".repeat(30);
        let text = format!(
            "{}filed on January 3, 2021 {}and again on February 4, 2022 {}",
            padding, padding, padding
        );
        let (findings, _) = scanned(engine.scan(&[chunk(&text)]));
        let f = findings
            .iter()
            .find(|f| f.category == Category::Timeline)
            .unwrap();
        assert!(f.evidence.len() <= 2);
        for e in &f.evidence {
            assert!(e.excerpt.chars().count() <= 40);
        }
        assert!(f.evidence[0].excerpt.contains("January 3, 2021"));
    }

    #[test]
    fn test_safety_filter_totality() {
        // A registry whose template itself trips the lexicon: the engine
        // must publish the placeholder and mark the finding suppressed.
        let hostile = Registry::new(vec![CategorySpec {
            category: Category::Consistency,
            claim_template: "This fabricated record shows concealment.",
            detectors: vec![Detector {
                label: "any_word",
                pattern: Regex::new(r"\brecord\b").unwrap(),
                weight: 5,
            }],
        }]);
        let engine = Engine::new(EngineOptions::default()).with_registry(hostile);
        let (findings, stats) = scanned(engine.scan(&[chunk("the record of the case")]));

        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert!(f.meta.suppressed);
        assert_eq!(
            f.meta.suppression_reason.as_deref(),
            Some(crate::safety::SUPPRESSION_REASON_LEXICON)
        );
        assert_eq!(f.claim, crate::safety::SUPPRESSED_CLAIM_TEXT);
        assert!(!SafetyFilter::standard().is_banned(&f.claim));
        assert_eq!(stats.suppressed, 1);
    }

    #[test]
    fn test_emitted_claims_never_match_lexicon() {
        let engine = Engine::new(EngineOptions::default());
        let text = "Filed on January 3, 2021. Fees of $500 due. See Exhibit B. \
                    Case No. 99-123 in the Circuit Court. Amended thereafter.";
        let (findings, _) = scanned(engine.scan(&[chunk(text)]));
        let filter = SafetyFilter::standard();
        assert!(!findings.is_empty());
        for f in &findings {
            assert!(!filter.is_banned(&f.claim), "claim leaked: {}", f.claim);
        }
    }

    #[test]
    fn test_determinism() {
        let engine = Engine::new(EngineOptions::default());
        let text = "Filed on January 3, 2021. Fees of $500 due. See Exhibit B.";
        let input = [chunk(text)];
        let (a, _) = scanned(engine.scan(&input));
        let (b, _) = scanned(engine.scan(&input));
        assert_eq!(a, b);
    }

    #[test]
    fn test_excerpt_window_clipping() {
        assert_eq!(excerpt_window("short", 0, 100), "short");
        let w = excerpt_window("abcdefghij", 5, 4);
        assert_eq!(w, "defg");
        // Multi-byte text never splits a char.
        let text = "ééééé January 3, 2021 ééééé";
        let w = excerpt_window(text, text.find('J').unwrap(), 10);
        assert!(w.chars().count() <= 10);
    }
}
