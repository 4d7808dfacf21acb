//! Memory CRUD, implemented as `impl Storage` methods.

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use super::{retention, validate_content, validate_tags, validate_unit_interval, Memory, MemoryType, MemoryUpdate};
use crate::error::{CoreError, Result};
use crate::storage::Storage;

/// Input to [`Storage::store`].
#[derive(Debug, Clone)]
pub struct StoreInput {
    pub content: String,
    pub memory_type: MemoryType,
    pub tags: Vec<String>,
    pub importance: f64,
    pub confidence: f64,
    pub project_id: String,
}

fn row_to_memory(row: &rusqlite::Row) -> rusqlite::Result<Memory> {
    let tags_json: String = row.get("tags")?;
    let memory_type_str: String = row.get("memory_type")?;
    Ok(Memory {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        content: row.get("content")?,
        memory_type: MemoryType::parse(&memory_type_str).unwrap_or(MemoryType::Note),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        importance: row.get("importance")?,
        confidence: row.get("confidence")?,
        strength: row.get("strength")?,
        access_count: row.get("access_count")?,
        source_count: row.get("source_count")?,
        contradiction_count: row.get("contradiction_count")?,
        last_accessed: row.get("last_accessed")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
    })
}

const SELECT_COLUMNS: &str = "id, project_id, content, memory_type, tags, importance, confidence, strength,
     access_count, source_count, contradiction_count, last_accessed, created_at, updated_at, deleted_at";

impl Storage {
    /// Validate and insert a new memory row with `strength = 1.0`. Embedding
    /// and proactive contradiction detection are the caller's job (they
    /// require the Model Gateway) — this method only guarantees the row is
    /// durable before either happens.
    pub fn store(&self, input: StoreInput) -> Result<Memory> {
        validate_content(&input.content)?;
        validate_tags(&input.tags)?;
        validate_unit_interval(input.importance, "importance")?;
        validate_unit_interval(input.confidence, "confidence")?;

        let now = Utc::now();
        let id = Uuid::new_v4().simple().to_string();
        let tags_json = serde_json::to_string(&input.tags)?;

        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO memories
                 (id, project_id, content, memory_type, tags, importance, confidence, strength,
                  access_count, source_count, contradiction_count, last_accessed, created_at, updated_at, deleted_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,1.0,0,1,0,?8,?8,?8,NULL)",
                params![
                    id, input.project_id, input.content, input.memory_type.as_str(),
                    tags_json, input.importance, input.confidence, now.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;

        self.get_memory_row(&id)?.ok_or_else(|| CoreError::NotFound(id.clone()))
    }

    /// Fetch a memory by id, regardless of project, without touching
    /// access bookkeeping. Used internally and by backup/restore checks.
    pub fn get_memory_row(&self, id: &str) -> Result<Option<Memory>> {
        self.with_read(|conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM memories WHERE id = ?1"),
                params![id],
                row_to_memory,
            )
            .optional()
            .map_err(CoreError::from)
        })
    }

    /// Recall a memory: increments `access_count`, recomputes `strength`,
    /// and bumps `last_accessed`. Soft-deleted or missing memories return
    /// `NotFound`.
    pub fn recall(&self, id: &str) -> Result<Memory> {
        let existing = self
            .get_memory_row(id)?
            .filter(|m| !m.is_deleted())
            .ok_or_else(|| CoreError::not_found(format!("memory {id}")))?;

        let now = Utc::now();
        let next_access = existing.access_count + 1;
        let next_strength = retention::strength_next(existing.strength, next_access);

        self.with_write(|conn| {
            conn.execute(
                "UPDATE memories SET access_count = ?1, strength = ?2, last_accessed = ?3 WHERE id = ?4",
                params![next_access, next_strength, now.to_rfc3339(), id],
            )?;
            Ok(())
        })?;

        self.get_memory_row(id)?.ok_or_else(|| CoreError::not_found(format!("memory {id}")))
    }

    /// Apply a whitelisted update. An empty update is an error. A content
    /// change is flagged via the returned bool so the caller knows to
    /// re-embed and re-run contradiction detection.
    pub fn update(&self, id: &str, update: MemoryUpdate) -> Result<(Memory, bool)> {
        if update.is_empty() {
            return Err(CoreError::validation("update must change at least one field"));
        }
        let existing = self
            .get_memory_row(id)?
            .filter(|m| !m.is_deleted())
            .ok_or_else(|| CoreError::not_found(format!("memory {id}")))?;

        if let Some(ref content) = update.content {
            validate_content(content)?;
        }
        if let Some(ref tags) = update.tags {
            validate_tags(tags)?;
        }
        if let Some(importance) = update.importance {
            validate_unit_interval(importance, "importance")?;
        }
        if let Some(confidence) = update.confidence {
            validate_unit_interval(confidence, "confidence")?;
        }

        let content_changed = update.content.as_ref().is_some_and(|c| c != &existing.content);
        let content = update.content.unwrap_or(existing.content);
        let memory_type = update.memory_type.unwrap_or(existing.memory_type);
        let tags = update.tags.unwrap_or(existing.tags);
        let importance = update.importance.unwrap_or(existing.importance);
        let confidence = update.confidence.unwrap_or(existing.confidence);
        let now = Utc::now();

        self.with_write(|conn| {
            conn.execute(
                "UPDATE memories SET content=?1, memory_type=?2, tags=?3, importance=?4, confidence=?5, updated_at=?6 WHERE id=?7",
                params![content, memory_type.as_str(), serde_json::to_string(&tags)?, importance, confidence, now.to_rfc3339(), id],
            )?;
            Ok(())
        })?;

        let updated = self.get_memory_row(id)?.ok_or_else(|| CoreError::not_found(format!("memory {id}")))?;
        Ok((updated, content_changed))
    }

    /// Soft or permanent delete.
    pub fn delete_memory(&self, id: &str, permanent: bool) -> Result<()> {
        self.get_memory_row(id)?.ok_or_else(|| CoreError::not_found(format!("memory {id}")))?;
        if permanent {
            self.with_write(|conn| {
                conn.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
                Ok(())
            })
        } else {
            let now = Utc::now();
            self.with_write(|conn| {
                conn.execute(
                    "UPDATE memories SET deleted_at = ?1 WHERE id = ?2",
                    params![now.to_rfc3339(), id],
                )?;
                Ok(())
            })
        }
    }

    /// Chronological listing by `updated_at DESC`, excluding soft-deletes
    /// unless requested.
    pub fn list_memories(&self, project_id: &str, limit: usize, include_deleted: bool) -> Result<Vec<Memory>> {
        self.with_read(|conn| {
            let sql = format!(
                "SELECT {SELECT_COLUMNS} FROM memories WHERE project_id = ?1 {} ORDER BY updated_at DESC LIMIT ?2",
                if include_deleted { "" } else { "AND deleted_at IS NULL" }
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![project_id, limit as i64], row_to_memory)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub(crate) fn list_memories_for_backup(&self, project_id: &str) -> Result<Vec<Memory>> {
        self.list_memories(project_id, i64::MAX as usize, false)
    }

    /// Boost/penalize base confidence by a fixed amount, clamped to [0,1].
    fn adjust_confidence(&self, id: &str, delta: f64) -> Result<Memory> {
        let existing = self
            .get_memory_row(id)?
            .filter(|m| !m.is_deleted())
            .ok_or_else(|| CoreError::not_found(format!("memory {id}")))?;
        let next = (existing.confidence + delta).clamp(0.0, 1.0);
        self.with_write(|conn| {
            conn.execute("UPDATE memories SET confidence = ?1, updated_at = ?2 WHERE id = ?3",
                params![next, Utc::now().to_rfc3339(), id])?;
            Ok(())
        })?;
        self.get_memory_row(id)?.ok_or_else(|| CoreError::not_found(format!("memory {id}")))
    }

    pub const CONFIRM_BOOST: f64 = 0.1;
    pub const CONTRADICT_PENALTY: f64 = 0.15;

    pub fn confirm(&self, id: &str) -> Result<Memory> {
        self.adjust_confidence(id, Self::CONFIRM_BOOST)
    }

    pub fn contradict(&self, id: &str) -> Result<Memory> {
        self.adjust_confidence(id, -Self::CONTRADICT_PENALTY)
    }

    /// Increment `memories.contradiction_count` by one (proactive detection
    /// path).
    pub fn bump_contradiction_count(&self, id: &str) -> Result<()> {
        self.with_write(|conn| {
            conn.execute(
                "UPDATE memories SET contradiction_count = contradiction_count + 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(content: &str) -> StoreInput {
        StoreInput {
            content: content.into(),
            memory_type: MemoryType::Fact,
            tags: vec!["x".into()],
            importance: 0.5,
            confidence: 0.5,
            project_id: "p1".into(),
        }
    }

    #[test]
    fn store_then_recall_increments_access() {
        let storage = Storage::open_in_memory().unwrap();
        let m = storage.store(input("hello")).unwrap();
        assert_eq!(m.access_count, 0);
        assert_eq!(m.strength, 1.0);

        let recalled = storage.recall(&m.id).unwrap();
        assert_eq!(recalled.access_count, 1);
        assert!(recalled.strength >= 1.0);
    }

    #[test]
    fn recall_missing_is_not_found() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(storage.recall("missing").is_err());
    }

    #[test]
    fn soft_delete_excludes_from_list() {
        let storage = Storage::open_in_memory().unwrap();
        let m = storage.store(input("hello")).unwrap();
        storage.delete_memory(&m.id, false).unwrap();
        let listed = storage.list_memories("p1", 10, false).unwrap();
        assert!(listed.is_empty());
        let with_deleted = storage.list_memories("p1", 10, true).unwrap();
        assert_eq!(with_deleted.len(), 1);
    }

    #[test]
    fn empty_update_is_error() {
        let storage = Storage::open_in_memory().unwrap();
        let m = storage.store(input("hello")).unwrap();
        assert!(storage.update(&m.id, MemoryUpdate::default()).is_err());
    }

    #[test]
    fn confirm_and_contradict_clamp_to_unit_interval() {
        let storage = Storage::open_in_memory().unwrap();
        let m = storage.store(input("hello")).unwrap();
        for _ in 0..20 {
            storage.confirm(&m.id).unwrap();
        }
        let confirmed = storage.get_memory_row(&m.id).unwrap().unwrap();
        assert!(confirmed.confidence <= 1.0);

        for _ in 0..20 {
            storage.contradict(&m.id).unwrap();
        }
        let contradicted = storage.get_memory_row(&m.id).unwrap().unwrap();
        assert!(contradicted.confidence >= 0.0);
    }
}
