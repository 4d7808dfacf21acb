//! Pure retention/strength/effective-confidence functions.
//!
//! Kept as free functions so they're directly unit-testable rather than
//! methods that touch storage.

use chrono::{DateTime, Utc};

use super::Memory;

/// Ebbinghaus decay constant.
pub const RETENTION_K: f64 = 0.5;

/// `retention(last_accessed, strength) = exp(-hours_since * K / (strength * 24))`.
/// Advisory signal for display/decay triggers only, never stored.
pub fn retention(last_accessed: DateTime<Utc>, strength: f64, now: DateTime<Utc>) -> f64 {
    let hours_since = (now - last_accessed).num_seconds().max(0) as f64 / 3600.0;
    let strength = strength.max(0.01);
    (-hours_since * RETENTION_K / (strength * 24.0)).exp()
}

/// `strength_next = min(10, strength + 0.2 * ln(access_count + 1))`.
pub fn strength_next(strength: f64, access_count: i64) -> f64 {
    let bumped = strength + 0.2 * ((access_count.max(0) as f64) + 1.0).ln();
    bumped.min(10.0)
}

/// Number of contradictions beyond which the penalty no longer grows.
const CONTRADICTION_PENALTY_CAP: i64 = 3;

/// Diminishing-returns source-count boost: +10% per source past the first,
/// saturating after ~5 sources.
fn source_boost(source_count: i64) -> f64 {
    let capped = source_count.clamp(1, 5) as f64;
    1.0 + 0.1 * (capped - 1.0)
}

/// Linear penalty capped at [`CONTRADICTION_PENALTY_CAP`] contradictions,
/// at most -0.3 total.
fn contradiction_penalty(contradiction_count: i64) -> f64 {
    let capped = contradiction_count.clamp(0, CONTRADICTION_PENALTY_CAP) as f64;
    0.1 * capped
}

/// Importance-dependent floor.
fn importance_floor(importance: f64) -> f64 {
    if importance >= 0.8 {
        0.4
    } else if importance >= 0.5 {
        0.2
    } else {
        0.1
    }
}

/// Composes base confidence with source-count boost, contradiction penalty
/// (capped at 3), a small recency term, and an importance floor. This is
/// what retrieval ranks by; `confidence` on the row stays raw.
pub fn effective_confidence(memory: &Memory, now: DateTime<Utc>) -> f64 {
    let boosted = memory.confidence * source_boost(memory.source_count);
    let penalized = boosted - contradiction_penalty(memory.contradiction_count);
    let recency = retention(memory.last_accessed, memory.strength.max(0.01), now);
    // Recency term is a small nudge, not a dominant factor: weight 0.05.
    let with_recency = penalized + 0.05 * recency;
    let floored = with_recency.max(importance_floor(memory.importance));
    floored.clamp(0.0, 1.0)
}
