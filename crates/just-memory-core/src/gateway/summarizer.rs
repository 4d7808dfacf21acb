//! Extractive summarization used by consolidation to compress clusters of
//! related memories into a single representative sentence set.
//!
//! Purely algorithmic (sentence-position + length scoring) rather than
//! model-backed — there is no summarization crate in the dependency stack —
//! so this always succeeds; it exists behind the gateway's timeout/async
//! plumbing anyway so callers don't need to special-case it.

pub struct Summarizer;

fn split_sentences(text: &str) -> Vec<&str> {
    text.split(['.', '!', '?'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect()
}

pub async fn summarize(text: String, max_sentences: usize) -> Option<String> {
    if max_sentences == 0 {
        return Some(String::new());
    }
    let sentences = split_sentences(&text);
    if sentences.len() <= max_sentences {
        return Some(sentences.join(". "));
    }

    // Score by position (earlier sentences favored) and length (very short
    // or very long sentences penalized), keep the top-N in original order.
    let mut scored: Vec<(usize, f64)> = sentences
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let position_score = 1.0 / (1.0 + i as f64 * 0.3);
            let len = s.split_whitespace().count() as f64;
            let length_score = if (5.0..=30.0).contains(&len) { 1.0 } else { 0.5 };
            (i, position_score * length_score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let mut chosen: Vec<usize> = scored.into_iter().take(max_sentences).map(|(i, _)| i).collect();
    chosen.sort_unstable();

    Some(chosen.into_iter().map(|i| sentences[i]).collect::<Vec<_>>().join(". "))
}
