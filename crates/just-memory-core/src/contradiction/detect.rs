//! Detection pipeline over a candidate pair of content strings.
//!
//! Each stage is an independent, separately unit-testable function. Symbolic
//! and neural detectors stay decoupled so each can be disabled via config
//! so each stage can be independently disabled.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::gateway::{GatewayResult, NliLabel};

/// Pre-filter threshold: below this cosine similarity, a pair is skipped
/// entirely. A calibration constant, tuned independently of the detection
/// logic itself.
pub const SEMANTIC_SIM_THRESHOLD: f32 = 0.75;
/// Similarity floor before the NLI check is even attempted (step 4).
pub const NLI_SIM_THRESHOLD: f32 = 0.85;
/// Minimum NLI contradiction-label confidence to emit a signal (step 4).
pub const NLI_CONFIDENCE_THRESHOLD: f32 = 0.85;

/// "Significant content word": length > 3 after a stop-token-free split
/// — a tunable heuristic.
const MIN_CONTENT_WORD_LEN: usize = 4;
const MIN_SHARED_WORDS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    Negation,
    Antonym,
    Factual,
    Nli,
    Temporal,
}

impl ContradictionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContradictionKind::Negation => "negation",
            ContradictionKind::Antonym => "antonym",
            ContradictionKind::Factual => "factual",
            ContradictionKind::Nli => "nli",
            ContradictionKind::Temporal => "temporal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Review,
    Resolve,
    Ignore,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContradictionSignal {
    pub kind: ContradictionKind,
    pub similarity: f32,
    pub explanation: String,
    pub suggested_action: SuggestedAction,
}

/// content words: lowercased, alphanumeric tokens longer than
/// [`MIN_CONTENT_WORD_LEN`].
pub fn content_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() > MIN_CONTENT_WORD_LEN - 1)
        .map(|w| w.to_string())
        .collect()
}

fn shared_content_words(a: &str, b: &str) -> usize {
    content_words(a).intersection(&content_words(b)).count()
}

static NEGATION_TOKENS: &[&str] = &["not", "no", "never", "isn't", "doesn't", "don't", "cannot", "can't", "won't", "without"];

fn has_negation(text: &str) -> bool {
    let lower = text.to_lowercase();
    NEGATION_TOKENS.iter().any(|t| lower.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'') == *t))
}

/// Small static antonym-pair table — a calibration parameter, not part of
/// the detection algorithm itself.
static ANTONYM_PAIRS: &[(&str, &str)] = &[
    ("enabled", "disabled"),
    ("true", "false"),
    ("up", "down"),
    ("on", "off"),
    ("fast", "slow"),
    ("public", "private"),
    ("open", "closed"),
    ("increase", "decrease"),
    ("increased", "decreased"),
    ("success", "failure"),
    ("pass", "fail"),
    ("passed", "failed"),
    ("allow", "deny"),
    ("allowed", "denied"),
    ("start", "stop"),
    ("started", "stopped"),
    ("synchronous", "asynchronous"),
    ("before", "after"),
];

fn antonym_pair_present(a: &str, b: &str) -> bool {
    let wa = content_words(a);
    let wb = content_words(b);
    ANTONYM_PAIRS.iter().any(|(x, y)| (wa.contains(*x) && wb.contains(*y)) || (wa.contains(*y) && wb.contains(*x)))
}

/// A tiny ordered list of factual-triple patterns: "X is Y", "X has Y",
/// "the N of X is Y", numeric/location/date forms.
struct TriplePattern {
    regex: &'static Lazy<Regex>,
}

static RE_IS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*(?:the\s+)?(.+?)\s+is\s+(.+?)\s*\.?\s*$").unwrap());
static RE_HAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*(.+?)\s+has\s+(.+?)\s*\.?\s*$").unwrap());
static RE_OF_IS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*the\s+(\w+)\s+of\s+(.+?)\s+is\s+(.+?)\s*\.?\s*$").unwrap());

fn triple_patterns() -> [TriplePattern; 2] {
    [TriplePattern { regex: &RE_IS }, TriplePattern { regex: &RE_HAS }]
}

#[derive(Debug, Clone)]
struct Triple {
    subject: String,
    object: String,
}

fn extract_triple(text: &str) -> Option<Triple> {
    if let Some(caps) = RE_OF_IS.captures(text) {
        return Some(Triple {
            subject: format!("{} {}", caps.get(2)?.as_str().to_lowercase(), caps.get(1)?.as_str().to_lowercase()),
            object: caps.get(3)?.as_str().to_lowercase(),
        });
    }
    for pattern in triple_patterns() {
        if let Some(caps) = pattern.regex.captures(text) {
            return Some(Triple {
                subject: caps.get(1)?.as_str().trim().to_lowercase(),
                object: caps.get(2)?.as_str().trim().to_lowercase(),
            });
        }
    }
    None
}

fn subjects_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    // Single-word equivalence: either subject is a single word contained in the other.
    let aw: Vec<&str> = a.split_whitespace().collect();
    let bw: Vec<&str> = b.split_whitespace().collect();
    (aw.len() == 1 && bw.contains(&aw[0])) || (bw.len() == 1 && aw.contains(&bw[0]))
}

static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(\.\d+)?").unwrap());

fn objects_disagree(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    let na: Vec<&str> = NUMERIC_RE.find_iter(a).map(|m| m.as_str()).collect();
    let nb: Vec<&str> = NUMERIC_RE.find_iter(b).map(|m| m.as_str()).collect();
    if !na.is_empty() && !nb.is_empty() {
        return na != nb;
    }
    antonym_pair_present(a, b)
}

/// Explicit version-like token, used by the resolution workflow's
/// false-positive heuristic as well as here for triples.
pub static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bv?\d+\.\d+(\.\d+)?\b").unwrap());

static DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").unwrap());

fn temporal_divergence(a: &str, b: &str) -> Option<String> {
    let da: Vec<&str> = DATE_RE.find_iter(a).map(|m| m.as_str()).collect();
    let db: Vec<&str> = DATE_RE.find_iter(b).map(|m| m.as_str()).collect();
    if da.is_empty() || db.is_empty() || da == db {
        return None;
    }
    if shared_content_words(a, b) < MIN_SHARED_WORDS {
        return None;
    }
    Some(format!("dates {da:?} vs {db:?} disagree on the same subject"))
}

/// Run the full pipeline over `(new, existing)`. `similarity` is the
/// pre-computed cosine similarity between their embeddings (or `None` if no
/// embedding is available for one side — the pre-filter then degrades to
/// "never pre-filtered", relying on the symbolic checks alone).
pub fn detect(new: &str, existing: &str, similarity: Option<f32>, nli: GatewayResult<(NliLabel, f32)>) -> Vec<ContradictionSignal> {
    if let Some(sim) = similarity {
        if sim < SEMANTIC_SIM_THRESHOLD {
            return Vec::new();
        }
    }
    let sim = similarity.unwrap_or(1.0);
    let mut signals = Vec::new();

    // Step 2: negation.
    let shared = shared_content_words(new, existing);
    if shared >= MIN_SHARED_WORDS && has_negation(new) != has_negation(existing) {
        signals.push(ContradictionSignal {
            kind: ContradictionKind::Negation,
            similarity: sim,
            explanation: format!("one side negates the other over {shared} shared content words"),
            suggested_action: SuggestedAction::Review,
        });
    }

    // Step 2: antonym (independent of the negation check).
    if shared >= MIN_SHARED_WORDS && antonym_pair_present(new, existing) {
        signals.push(ContradictionSignal {
            kind: ContradictionKind::Antonym,
            similarity: sim,
            explanation: "opposing terms found in an antonym table over shared content".into(),
            suggested_action: SuggestedAction::Review,
        });
    }

    // Step 3: factual triples.
    if let (Some(t1), Some(t2)) = (extract_triple(new), extract_triple(existing)) {
        if subjects_match(&t1.subject, &t2.subject) && objects_disagree(&t1.object, &t2.object) {
            signals.push(ContradictionSignal {
                kind: ContradictionKind::Factual,
                similarity: sim,
                explanation: format!("\"{}\" disagrees with \"{}\" for subject \"{}\"", t1.object, t2.object, t1.subject),
                suggested_action: SuggestedAction::Resolve,
            });
        }
    }

    // Step 4: NLI, only above the higher similarity bar.
    if sim >= NLI_SIM_THRESHOLD {
        if let GatewayResult::Ready((label, confidence)) = nli {
            match label {
                NliLabel::Entailment if confidence >= NLI_CONFIDENCE_THRESHOLD => {
                    // Strong entailment short-circuits the pipeline.
                    return signals.into_iter().filter(|s| s.kind != ContradictionKind::Nli).collect();
                }
                NliLabel::Contradiction if confidence >= NLI_CONFIDENCE_THRESHOLD => {
                    signals.push(ContradictionSignal {
                        kind: ContradictionKind::Nli,
                        similarity: sim,
                        explanation: format!("NLI classifier reports contradiction at {confidence:.2} confidence"),
                        suggested_action: SuggestedAction::Resolve,
                    });
                }
                _ => {}
            }
        }
    }

    // Step 5: temporal divergence.
    if let Some(explanation) = temporal_divergence(new, existing) {
        signals.push(ContradictionSignal {
            kind: ContradictionKind::Temporal,
            similarity: sim,
            explanation,
            suggested_action: SuggestedAction::Review,
        });
    }

    signals
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factual_port_contradiction_detected() {
        let signals = detect(
            "The project default port is 8080",
            "The project default port is 3000",
            Some(0.9),
            GatewayResult::NotAvailable,
        );
        assert!(signals.iter().any(|s| s.kind == ContradictionKind::Factual));
    }

    #[test]
    fn below_prefilter_threshold_skips_everything() {
        let signals = detect("apples are tasty fruit", "rockets launch into orbit", Some(0.1), GatewayResult::NotAvailable);
        assert!(signals.is_empty());
    }

    #[test]
    fn negation_detected_over_shared_words() {
        let signals = detect(
            "The deployment pipeline is not automated yet",
            "The deployment pipeline is fully automated",
            Some(0.9),
            GatewayResult::NotAvailable,
        );
        assert!(signals.iter().any(|s| s.kind == ContradictionKind::Negation));
    }

    #[test]
    fn antonym_detected_over_shared_words() {
        let signals = detect(
            "Feature flag rollout is enabled for all tenants",
            "Feature flag rollout is disabled for all tenants",
            Some(0.9),
            GatewayResult::NotAvailable,
        );
        assert!(signals.iter().any(|s| s.kind == ContradictionKind::Antonym));
    }

    #[test]
    fn strong_entailment_short_circuits() {
        let signals = detect(
            "Feature flag rollout is enabled for all tenants",
            "Feature flag rollout is enabled for every tenant",
            Some(0.95),
            GatewayResult::Ready((NliLabel::Entailment, 0.99)),
        );
        assert!(signals.iter().all(|s| s.kind != ContradictionKind::Nli));
    }

    #[test]
    fn temporal_divergence_detected() {
        let signals = detect(
            "The migration completed on 2024-06-01 for the billing service",
            "The migration completed on 2024-07-15 for the billing service",
            Some(0.9),
            GatewayResult::NotAvailable,
        );
        assert!(signals.iter().any(|s| s.kind == ContradictionKind::Temporal));
    }
}
