//! Memory types, retention math, and CRUD for the primary `memories` table.
//!
//! The storage-backed operations (`store`, `recall`, `update`, `delete`,
//! `list`, `confirm`/`contradict`) live in [`ops`] as `impl Storage` blocks.
//! Strength and effective-confidence follow an Ebbinghaus-style exponential
//! decay rather than a full spaced-repetition scheduler.

mod ops;
pub mod retention;

pub use ops::StoreInput;
pub use retention::{effective_confidence, retention as retention_score, strength_next};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content/tag/count limits.
pub const MAX_CONTENT_CHARS: usize = 100_000;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_CHARS: usize = 100;

/// One of the seven memory kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Event,
    Observation,
    Preference,
    Note,
    Decision,
    Procedure,
}

impl MemoryType {
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryType::Fact => "fact",
            MemoryType::Event => "event",
            MemoryType::Observation => "observation",
            MemoryType::Preference => "preference",
            MemoryType::Note => "note",
            MemoryType::Decision => "decision",
            MemoryType::Procedure => "procedure",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "fact" => MemoryType::Fact,
            "event" => MemoryType::Event,
            "observation" => MemoryType::Observation,
            "preference" => MemoryType::Preference,
            "note" => MemoryType::Note,
            "decision" => MemoryType::Decision,
            "procedure" => MemoryType::Procedure,
            _ => return None,
        })
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Project identifier reserved for cross-project memories.
pub const GLOBAL_PROJECT: &str = "global";

/// The stored memory row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    pub id: String,
    pub project_id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub tags: Vec<String>,
    pub importance: f64,
    pub confidence: f64,
    pub strength: f64,
    pub access_count: i64,
    pub source_count: i64,
    pub contradiction_count: i64,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Memory {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// `effective_confidence` ranks retrieval; `confidence` on the row
    /// stays the raw base value.
    pub fn effective_confidence(&self, now: DateTime<Utc>) -> f64 {
        retention::effective_confidence(self, now)
    }
}

/// Whitelist for `update` — an empty update is an error.
#[derive(Debug, Clone, Default)]
pub struct MemoryUpdate {
    pub content: Option<String>,
    pub memory_type: Option<MemoryType>,
    pub tags: Option<Vec<String>>,
    pub importance: Option<f64>,
    pub confidence: Option<f64>,
}

impl MemoryUpdate {
    pub fn is_empty(&self) -> bool {
        self.content.is_none()
            && self.memory_type.is_none()
            && self.tags.is_none()
            && self.importance.is_none()
            && self.confidence.is_none()
    }
}

pub fn validate_content(content: &str) -> crate::error::Result<()> {
    if content.is_empty() || content.chars().count() > MAX_CONTENT_CHARS {
        return Err(crate::error::CoreError::validation(format!(
            "content must be 1..={MAX_CONTENT_CHARS} chars"
        )));
    }
    Ok(())
}

pub fn validate_tags(tags: &[String]) -> crate::error::Result<()> {
    if tags.len() > MAX_TAGS {
        return Err(crate::error::CoreError::validation(format!(
            "at most {MAX_TAGS} tags allowed"
        )));
    }
    for tag in tags {
        if tag.chars().count() > MAX_TAG_CHARS {
            return Err(crate::error::CoreError::validation(format!(
                "tag exceeds {MAX_TAG_CHARS} chars: {tag}"
            )));
        }
    }
    Ok(())
}

pub fn validate_unit_interval(value: f64, field: &str) -> crate::error::Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(crate::error::CoreError::validation(format!(
            "{field} must be in [0,1], got {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_type_round_trips() {
        for t in [
            MemoryType::Fact,
            MemoryType::Event,
            MemoryType::Observation,
            MemoryType::Preference,
            MemoryType::Note,
            MemoryType::Decision,
            MemoryType::Procedure,
        ] {
            assert_eq!(MemoryType::parse(t.as_str()), Some(t));
        }
    }

    #[test]
    fn content_limit_enforced() {
        assert!(validate_content(&"x".repeat(100_001)).is_err());
        assert!(validate_content(&"x".repeat(100_000)).is_ok());
        assert!(validate_content("").is_err());
    }

    #[test]
    fn tag_limits_enforced() {
        let too_many: Vec<String> = (0..21).map(|i| i.to_string()).collect();
        assert!(validate_tags(&too_many).is_err());
        assert!(validate_tags(&["ok".to_string()]).is_ok());
        assert!(validate_tags(&["x".repeat(101)]).is_err());
    }
}
