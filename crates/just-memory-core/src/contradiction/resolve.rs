//! Resolution workflow over previously recorded contradiction edges.
//!
//! A contradiction is recorded as an edge between two memories whose
//! `relation_type` is `contradiction_<kind>` (see [`crate::graph::
//! contradiction_relation_type`]), plus a row in `contradiction_resolutions`
//! tracking its status. `scan` surfaces the unresolved ones; `resolve`
//! applies one of five outcomes atomically; two heuristics auto-resolve
//! common false positives before a human ever sees them.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use super::detect::VERSION_RE;
use crate::error::{CoreError, Result};
use crate::graph::CONTRADICTION_PREFIX;
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    Pending,
    Resolved,
    AutoResolved,
}

impl ResolutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionStatus::Pending => "pending",
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::AutoResolved => "auto_resolved",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "resolved" => ResolutionStatus::Resolved,
            "auto_resolved" => ResolutionStatus::AutoResolved,
            _ => ResolutionStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    KeepFirst,
    KeepSecond,
    KeepBoth,
    Merge,
    DeleteBoth,
}

impl ResolutionKind {
    fn as_str(self) -> &'static str {
        match self {
            ResolutionKind::KeepFirst => "keep_first",
            ResolutionKind::KeepSecond => "keep_second",
            ResolutionKind::KeepBoth => "keep_both",
            ResolutionKind::Merge => "merge",
            ResolutionKind::DeleteBoth => "delete_both",
        }
    }
}

/// Resolution kinds that remove (or supersede) one of the two memories —
/// these are excluded from [`Storage::recalibrate_contradiction_counts`].
const MEMORY_REMOVING_KINDS: &str = "'keep_first','keep_second','merge','delete_both'";

#[derive(Debug, Clone, Serialize)]
pub struct ContradictionResolution {
    pub id: String,
    pub project_id: String,
    pub memory_id_1: String,
    pub memory_id_2: String,
    pub edge_id: String,
    pub status: ResolutionStatus,
    pub chosen_memory: Option<String>,
    pub note: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// The resolution kind actually applied (`keep_first` | `keep_second` |
    /// `keep_both` | `merge` | `delete_both`); `None` while `pending`.
    pub kind: Option<String>,
}

fn row_to_resolution(row: &rusqlite::Row) -> rusqlite::Result<ContradictionResolution> {
    let status: String = row.get("status")?;
    Ok(ContradictionResolution {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        memory_id_1: row.get("memory_id_1")?,
        memory_id_2: row.get("memory_id_2")?,
        edge_id: row.get("edge_id")?,
        status: ResolutionStatus::parse(&status),
        chosen_memory: row.get("chosen_memory")?,
        note: row.get("note")?,
        resolved_at: row.get("resolved_at")?,
        created_at: row.get("created_at")?,
        kind: row.get("kind")?,
    })
}

const SELECT: &str = "id, project_id, memory_id_1, memory_id_2, edge_id, status, chosen_memory, note, resolved_at, created_at, kind";

impl Storage {
    /// Record a pending resolution row alongside a freshly created
    /// contradiction edge. Called by the memory layer right after
    /// `edge_create` with a `contradiction_*` relation type.
    pub fn contradiction_record(
        &self,
        project_id: &str,
        memory_id_1: &str,
        memory_id_2: &str,
        edge_id: &str,
    ) -> Result<ContradictionResolution> {
        let id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO contradiction_resolutions
                 (id, project_id, memory_id_1, memory_id_2, edge_id, status, chosen_memory, note, resolved_at, created_at)
                 VALUES (?1,?2,?3,?4,?5,'pending',NULL,NULL,NULL,?6)",
                params![id, project_id, memory_id_1, memory_id_2, edge_id, now.to_rfc3339()],
            )?;
            Ok(())
        })?;
        self.contradiction_get(&id)?.ok_or_else(|| CoreError::not_found("contradiction resolution"))
    }

    pub fn contradiction_get(&self, id: &str) -> Result<Option<ContradictionResolution>> {
        self.with_read(|conn| {
            conn.query_row(&format!("SELECT {SELECT} FROM contradiction_resolutions WHERE id = ?1"), params![id], row_to_resolution)
                .optional()
                .map_err(CoreError::from)
        })
    }

    /// Unresolved contradictions in a project, oldest first.
    pub fn contradiction_scan(&self, project_id: &str) -> Result<Vec<ContradictionResolution>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                &format!("SELECT {SELECT} FROM contradiction_resolutions WHERE project_id = ?1 AND status = 'pending' ORDER BY created_at ASC"),
            )?;
            let rows = stmt.query_map(params![project_id], row_to_resolution)?.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Apply a resolution atomically: invalidate the contradiction edge,
    /// adjust the two memories (confidence penalty removed from the kept
    /// side, content merged or rows deleted as the kind requires), and mark
    /// the resolution row resolved.
    pub fn contradiction_resolve(
        &self,
        id: &str,
        kind: ResolutionKind,
        note: Option<String>,
        merged_content: Option<String>,
    ) -> Result<ContradictionResolution> {
        let record = self.contradiction_get(id)?.ok_or_else(|| CoreError::not_found(format!("contradiction {id}")))?;
        if record.status != ResolutionStatus::Pending {
            return Ok(record);
        }

        let first = self
            .get_memory_row(&record.memory_id_1)?
            .ok_or_else(|| CoreError::ReferentialIntegrity(format!("memory {} no longer exists", record.memory_id_1)))?;
        self.get_memory_row(&record.memory_id_2)?
            .ok_or_else(|| CoreError::ReferentialIntegrity(format!("memory {} no longer exists", record.memory_id_2)))?;

        self.edge_invalidate(&record.edge_id)?;

        let chosen = match kind {
            ResolutionKind::KeepFirst => {
                self.delete_memory(&record.memory_id_2, false)?;
                Some(record.memory_id_1.clone())
            }
            ResolutionKind::KeepSecond => {
                self.delete_memory(&record.memory_id_1, false)?;
                Some(record.memory_id_2.clone())
            }
            ResolutionKind::KeepBoth => None,
            ResolutionKind::Merge => {
                let merged_content = merged_content.ok_or_else(|| CoreError::validation("merge requires merged_content"))?;
                let merged = self.store(crate::memory::StoreInput {
                    content: merged_content,
                    memory_type: first.memory_type,
                    tags: first.tags.clone(),
                    importance: first.importance,
                    confidence: first.confidence.max(0.7),
                    project_id: first.project_id.clone(),
                })?;
                self.delete_memory(&record.memory_id_1, false)?;
                self.delete_memory(&record.memory_id_2, false)?;
                Some(merged.id)
            }
            ResolutionKind::DeleteBoth => {
                self.delete_memory(&record.memory_id_1, false)?;
                self.delete_memory(&record.memory_id_2, false)?;
                None
            }
        };

        let now = Utc::now();
        self.with_write(|conn| {
            conn.execute(
                "UPDATE contradiction_resolutions SET status = 'resolved', chosen_memory = ?1, note = ?2, resolved_at = ?3, kind = ?5 WHERE id = ?4",
                params![chosen, note, now.to_rfc3339(), id, kind.as_str()],
            )?;
            Ok(())
        })?;

        self.contradiction_get(id)?.ok_or_else(|| CoreError::not_found(format!("contradiction {id}")))
    }

    /// Auto-resolve heuristics, run over every still-pending contradiction
    /// in a project. Returns the ids that were auto-resolved.
    ///
    /// - version-update false positive: both contents contain a version
    ///   token (`v1.2`, `2.0.0`, ...), those tokens differ, and the two
    ///   contents share ≥3 content words outside the version token — kept
    ///   as `keep_both`, neither memory is touched.
    /// - temporal supersession: the two `created_at` timestamps differ by
    ///   ≥30 days and the contents share ≥3 content words — the newer one
    ///   is kept, the older is soft-deleted.
    ///
    /// Version-update is checked first: a pair that also happens to be 30+
    /// days apart is still a false positive, not a real contradiction, so
    /// it must not lose a memory to the temporal heuristic.
    pub fn contradiction_auto_resolve(&self, project_id: &str) -> Result<Vec<String>> {
        let pending = self.contradiction_scan(project_id)?;
        let mut resolved = Vec::new();

        for record in pending {
            let Some(m1) = self.get_memory_row(&record.memory_id_1)? else { continue };
            let Some(m2) = self.get_memory_row(&record.memory_id_2)? else { continue };

            let shared = super::detect::content_words(&m1.content)
                .intersection(&super::detect::content_words(&m2.content))
                .count();

            let versions_1: Vec<&str> = VERSION_RE.find_iter(&m1.content).map(|m| m.as_str()).collect();
            let versions_2: Vec<&str> = VERSION_RE.find_iter(&m2.content).map(|m| m.as_str()).collect();
            let is_version_update =
                !versions_1.is_empty() && !versions_2.is_empty() && versions_1 != versions_2 && shared >= 3;

            if is_version_update {
                self.edge_invalidate(&record.edge_id)?;
                let now = Utc::now();
                self.with_write(|conn| {
                    conn.execute(
                        "UPDATE contradiction_resolutions SET status = 'auto_resolved', chosen_memory = NULL, note = ?1, resolved_at = ?2, kind = 'keep_both' WHERE id = ?3",
                        params!["auto: version update", now.to_rfc3339(), record.id],
                    )?;
                    Ok(())
                })?;
                resolved.push(record.id);
                continue;
            }

            let gap = (m2.created_at - m1.created_at).abs();
            let is_temporal_supersession = gap > chrono::Duration::days(30) && shared >= 3;
            if !is_temporal_supersession {
                continue;
            }

            let keep_second = m2.created_at >= m1.created_at;
            self.edge_invalidate(&record.edge_id)?;
            if keep_second {
                self.delete_memory(&record.memory_id_1, false)?;
            } else {
                self.delete_memory(&record.memory_id_2, false)?;
            }

            let chosen = if keep_second { &record.memory_id_2 } else { &record.memory_id_1 };
            let kind = if keep_second { "keep_second" } else { "keep_first" };
            let now = Utc::now();
            self.with_write(|conn| {
                conn.execute(
                    "UPDATE contradiction_resolutions SET status = 'auto_resolved', chosen_memory = ?1, note = ?2, resolved_at = ?3, kind = ?5 WHERE id = ?4",
                    params![chosen, "auto: temporal supersession", now.to_rfc3339(), record.id, kind],
                )?;
                Ok(())
            })?;
            resolved.push(record.id);
        }

        Ok(resolved)
    }

    /// Recompute `memories.contradiction_count` for every memory in a
    /// project from its incident `contradiction_*` edges, excluding any
    /// whose resolution moved the memory out (`keep_first`/`keep_second`/
    /// `merge`/`delete_both`) — a `pending` or `keep_both` resolution still
    /// counts, matching the invariant in full. Corrects drift from manual
    /// edge edits or restores.
    pub fn recalibrate_contradiction_counts(&self, project_id: &str) -> Result<usize> {
        let memories = self.list_memories(project_id, i64::MAX as usize, true)?;
        let mut touched = 0;
        for memory in memories {
            let count: i64 = self.with_read(|conn| {
                conn.query_row(
                    &format!(
                        "SELECT COUNT(*) FROM edges e WHERE (e.from_id = ?1 OR e.to_id = ?1)
                         AND e.relation_type LIKE '{CONTRADICTION_PREFIX}%'
                         AND NOT EXISTS (
                             SELECT 1 FROM contradiction_resolutions cr
                             WHERE cr.edge_id = e.id AND cr.kind IN ({MEMORY_REMOVING_KINDS})
                         )"
                    ),
                    params![memory.id],
                    |r| r.get(0),
                )
                .map_err(CoreError::from)
            })?;
            if count as i64 != memory.contradiction_count {
                self.with_write(|conn| {
                    conn.execute(
                        "UPDATE memories SET contradiction_count = ?1 WHERE id = ?2",
                        params![count, memory.id],
                    )?;
                    Ok(())
                })?;
                touched += 1;
            }
        }
        Ok(touched)
    }

    pub(crate) fn list_resolutions_for_backup(&self, project_id: &str) -> Result<Vec<ContradictionResolution>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {SELECT} FROM contradiction_resolutions WHERE project_id = ?1"))?;
            let rows = stmt.query_map(params![project_id], row_to_resolution)?.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryType, StoreInput};
    use serde_json::Value;

    fn seed(storage: &Storage, content: &str) -> String {
        storage
            .store(StoreInput { content: content.into(), memory_type: MemoryType::Fact, tags: vec![], importance: 0.5, confidence: 0.5, project_id: "p1".into() })
            .unwrap()
            .id
    }

    #[test]
    fn keep_first_deletes_second_and_invalidates_edge() {
        let storage = Storage::open_in_memory().unwrap();
        let a = seed(&storage, "a");
        let b = seed(&storage, "b");
        let edge = storage.edge_create(&a, &b, "contradiction_factual", 0.9, Value::Null, "p1").unwrap();
        let record = storage.contradiction_record("p1", &a, &b, &edge.id).unwrap();

        let resolved = storage.contradiction_resolve(&record.id, ResolutionKind::KeepFirst, None, None).unwrap();
        assert_eq!(resolved.status, ResolutionStatus::Resolved);
        assert_eq!(resolved.chosen_memory.as_deref(), Some(a.as_str()));
        assert!(storage.get_memory_row(&b).unwrap().unwrap().is_deleted());
        assert!(!storage.edge_get(&edge.id).unwrap().unwrap().is_valid());
    }

    #[test]
    fn auto_resolve_handles_version_update_false_positive() {
        let storage = Storage::open_in_memory().unwrap();
        let a = seed(&storage, "Just-Memory v4.2 uses SQLite backend with embedding support");
        let b = seed(&storage, "Just-Memory v4.3 uses SQLite backend with embedding support");
        let edge = storage.edge_create(&a, &b, "contradiction_factual", 0.9, Value::Null, "p1").unwrap();
        storage.contradiction_record("p1", &a, &b, &edge.id).unwrap();

        let resolved_ids = storage.contradiction_auto_resolve("p1").unwrap();
        assert_eq!(resolved_ids.len(), 1);
        let resolution = storage.contradiction_get(&resolved_ids[0]).unwrap().unwrap();
        assert_eq!(resolution.status, ResolutionStatus::AutoResolved);
        assert!(resolution.note.unwrap().contains("version update"));
        assert!(resolution.chosen_memory.is_none());
        assert!(!storage.get_memory_row(&a).unwrap().unwrap().is_deleted());
        assert!(!storage.get_memory_row(&b).unwrap().unwrap().is_deleted());
    }

    #[test]
    fn auto_resolve_handles_temporal_supersession() {
        let storage = Storage::open_in_memory().unwrap();
        let a = seed(&storage, "The project default port is 3000 for local development");
        let b = seed(&storage, "The project default port is 8080 for local development");
        storage.with_write(|conn| {
            conn.execute(
                "UPDATE memories SET created_at = '2024-01-01T00:00:00Z' WHERE id = ?1",
                rusqlite::params![a],
            )?;
            conn.execute(
                "UPDATE memories SET created_at = '2024-06-01T00:00:00Z' WHERE id = ?1",
                rusqlite::params![b],
            )?;
            Ok(())
        }).unwrap();
        let edge = storage.edge_create(&a, &b, "contradiction_factual", 0.9, Value::Null, "p1").unwrap();
        storage.contradiction_record("p1", &a, &b, &edge.id).unwrap();

        let resolved_ids = storage.contradiction_auto_resolve("p1").unwrap();
        assert_eq!(resolved_ids.len(), 1);
        assert!(storage.get_memory_row(&a).unwrap().unwrap().is_deleted());
        assert!(!storage.get_memory_row(&b).unwrap().unwrap().is_deleted());
    }

    #[test]
    fn recalibrate_fixes_drifted_counts() {
        let storage = Storage::open_in_memory().unwrap();
        let a = seed(&storage, "a");
        let b = seed(&storage, "b");
        storage.edge_create(&a, &b, "contradiction_factual", 0.9, Value::Null, "p1").unwrap();
        let touched = storage.recalibrate_contradiction_counts("p1").unwrap();
        assert_eq!(touched, 2);
        assert_eq!(storage.get_memory_row(&a).unwrap().unwrap().contradiction_count, 1);
    }
}
