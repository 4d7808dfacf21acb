//! Natural-language-inference check between two short texts.
//!
//! No NLI classifier crate is part of the dependency stack, so this builds
//! the check on top of the embedder that is already present: high cosine
//! similarity plus a negation-token asymmetry is treated as contradiction;
//! very high similarity with no asymmetry is treated as entailment;
//! everything else is neutral. Returns `None` (surfaced by the gateway as
//! `NotAvailable`) whenever the embedder itself can't produce a vector.

use super::embedder::{cosine_similarity, embed_one};
use crate::config::EmbeddingSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NliLabel {
    Entailment,
    Neutral,
    Contradiction,
}

const ENTAILMENT_SIM: f32 = 0.92;
const CONTRADICTION_SIM: f32 = 0.80;

static NEGATION_TOKENS: &[&str] = &["not", "no", "never", "isn't", "doesn't", "don't", "cannot", "can't", "won't"];

fn has_negation(text: &str) -> bool {
    let lower = text.to_lowercase();
    NEGATION_TOKENS
        .iter()
        .any(|t| lower.split_whitespace().any(|w| w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'') == *t))
}

pub async fn classify(premise: String, hypothesis: String, embedding_size: EmbeddingSize) -> Option<(NliLabel, f32)> {
    let a = embed_one(premise.clone(), embedding_size).await?;
    let b = embed_one(hypothesis.clone(), embedding_size).await?;
    let sim = cosine_similarity(&a, &b);

    let asymmetric_negation = has_negation(&premise) != has_negation(&hypothesis);

    if asymmetric_negation && sim >= CONTRADICTION_SIM {
        return Some((NliLabel::Contradiction, sim));
    }
    if !asymmetric_negation && sim >= ENTAILMENT_SIM {
        return Some((NliLabel::Entailment, sim));
    }
    Some((NliLabel::Neutral, sim))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_tokens_detected() {
        assert!(has_negation("this is not enabled"));
        assert!(!has_negation("this is enabled"));
    }
}
