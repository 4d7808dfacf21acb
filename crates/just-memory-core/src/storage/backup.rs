//! Backup & restore.
//!
//! Snapshots are versioned JSON artifacts written beneath an isolated
//! `backups/` directory under the data dir. Restore refuses any path that
//! escapes that directory (path-traversal guard) and rejects payloads
//! missing `version` or `data`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::Storage;
use crate::contradiction::ContradictionResolution;
use crate::error::{CoreError, Result};
use crate::graph::{Edge, Entity, EntityRelation};
use crate::memory::Memory;

const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContradictionResolutionRecord {
    pub id: String,
    pub project_id: String,
    pub memory_id_1: String,
    pub memory_id_2: String,
    pub edge_id: String,
    pub status: String,
    pub chosen_memory: Option<String>,
    pub note: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub kind: Option<String>,
}

impl From<ContradictionResolution> for ContradictionResolutionRecord {
    fn from(r: ContradictionResolution) -> Self {
        Self {
            id: r.id,
            project_id: r.project_id,
            memory_id_1: r.memory_id_1,
            memory_id_2: r.memory_id_2,
            edge_id: r.edge_id,
            status: r.status.as_str().to_string(),
            chosen_memory: r.chosen_memory,
            note: r.note,
            resolved_at: r.resolved_at,
            created_at: r.created_at,
            kind: r.kind,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackupCounts {
    pub memories: usize,
    pub entities: usize,
    pub edges: usize,
    pub relations: usize,
    pub contradiction_resolutions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackupData {
    pub memories: Vec<Memory>,
    pub entities: Vec<Entity>,
    pub edges: Vec<Edge>,
    pub relations: Vec<EntityRelation>,
    pub contradiction_resolutions: Vec<ContradictionResolutionRecord>,
}

/// `{version, project_id, created_at, counts, data:{...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub version: u32,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub counts: BackupCounts,
    pub data: BackupData,
}

/// Restore merge strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreMode {
    /// Ignore rows whose id already exists.
    Merge,
    /// Delete current project rows, then insert.
    Replace,
}

fn resolve_within(dir: &Path, path: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let dir = dir.canonicalize()?;
    let candidate = if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    };
    // The artifact may not exist yet (snapshot write path); canonicalize the
    // parent instead when the file itself isn't there.
    let check = if candidate.exists() {
        candidate.canonicalize()?
    } else {
        let parent = candidate
            .parent()
            .ok_or_else(|| CoreError::validation("invalid backup path"))?;
        std::fs::create_dir_all(parent)?;
        let mut canon = parent.canonicalize()?;
        canon.push(candidate.file_name().ok_or_else(|| CoreError::validation("invalid backup path"))?);
        canon
    };
    if !check.starts_with(&dir) {
        return Err(CoreError::validation("backup path escapes backup directory"));
    }
    Ok(check)
}

impl Storage {
    /// Serialize every non-deleted memory, entity, edge, relation, and
    /// contradiction resolution for `project` into a versioned JSON artifact
    /// beneath `backups/`.
    pub fn backup_snapshot(&self, project_id: &str) -> Result<PathBuf> {
        let memories = self.list_memories_for_backup(project_id)?;
        let entities = self.list_entities_for_backup(project_id)?;
        let edges = self.list_edges_for_backup(project_id)?;
        let relations = self.list_relations_for_backup(project_id)?;
        let contradiction_resolutions: Vec<ContradictionResolutionRecord> =
            self.list_resolutions_for_backup(project_id)?.into_iter().map(Into::into).collect();

        let artifact = BackupArtifact {
            version: BACKUP_VERSION,
            project_id: project_id.to_string(),
            created_at: Utc::now(),
            counts: BackupCounts {
                memories: memories.len(),
                entities: entities.len(),
                edges: edges.len(),
                relations: relations.len(),
                contradiction_resolutions: contradiction_resolutions.len(),
            },
            data: BackupData {
                memories,
                entities,
                edges,
                relations,
                contradiction_resolutions,
            },
        };

        let dir = self.backup_dir();
        let filename = format!("{}-{}.json", project_id, artifact.created_at.timestamp());
        let path = resolve_within(&dir, Path::new(&filename))?;
        let json = serde_json::to_vec_pretty(&artifact)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn backup_list(&self) -> Result<Vec<PathBuf>> {
        let dir = self.backup_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().extension().map(|e| e == "json").unwrap_or(false) {
                out.push(entry.path());
            }
        }
        out.sort();
        Ok(out)
    }

    /// Load and validate a backup artifact without restoring it.
    pub fn backup_read(&self, path: &Path) -> Result<BackupArtifact> {
        let resolved = resolve_within(&self.backup_dir(), path)?;
        let raw = std::fs::read(&resolved)?;
        let value: serde_json::Value = serde_json::from_slice(&raw)?;
        if value.get("version").is_none() || value.get("data").is_none() {
            return Err(CoreError::validation("backup payload missing version or data"));
        }
        let artifact: BackupArtifact = serde_json::from_value(value)?;
        Ok(artifact)
    }

    /// Restore a backup artifact. `merge` ignores id conflicts; `replace`
    /// deletes current project rows first.
    pub fn backup_restore(&self, path: &Path, mode: RestoreMode) -> Result<BackupCounts> {
        let artifact = self.backup_read(path)?;

        self.with_transaction(|tx| {
            if mode == RestoreMode::Replace {
                tx.execute("DELETE FROM memories WHERE project_id = ?1", rusqlite::params![artifact.project_id])?;
                tx.execute("DELETE FROM entities WHERE project_id = ?1", rusqlite::params![artifact.project_id])?;
                tx.execute("DELETE FROM edges WHERE project_id = ?1", rusqlite::params![artifact.project_id])?;
                tx.execute("DELETE FROM entity_relations WHERE project_id = ?1", rusqlite::params![artifact.project_id])?;
                tx.execute(
                    "DELETE FROM contradiction_resolutions WHERE project_id = ?1",
                    rusqlite::params![artifact.project_id],
                )?;
            }

            for m in &artifact.data.memories {
                tx.execute(
                    "INSERT OR IGNORE INTO memories
                     (id, project_id, content, memory_type, tags, importance, confidence, strength,
                      access_count, source_count, contradiction_count, last_accessed, created_at, updated_at, deleted_at)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                    rusqlite::params![
                        m.id, m.project_id, m.content, m.memory_type.as_str(),
                        serde_json::to_string(&m.tags)?, m.importance, m.confidence, m.strength,
                        m.access_count, m.source_count, m.contradiction_count,
                        m.last_accessed.to_rfc3339(), m.created_at.to_rfc3339(), m.updated_at.to_rfc3339(),
                        m.deleted_at.map(|d| d.to_rfc3339()),
                    ],
                )?;
            }
            for e in &artifact.data.entities {
                tx.execute(
                    "INSERT OR IGNORE INTO entities (id, project_id, name, entity_type, observations, created_at, updated_at)
                     VALUES (?1,?2,?3,?4,?5,?6,?7)",
                    rusqlite::params![
                        e.id, e.project_id, e.name, e.entity_type,
                        serde_json::to_string(&e.observations)?,
                        e.created_at.to_rfc3339(), e.updated_at.to_rfc3339(),
                    ],
                )?;
            }
            for edge in &artifact.data.edges {
                tx.execute(
                    "INSERT OR IGNORE INTO edges (id, project_id, from_id, to_id, relation_type, confidence, metadata, valid_from, valid_to)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9)",
                    rusqlite::params![
                        edge.id, edge.project_id, edge.from_id, edge.to_id, edge.relation_type,
                        edge.confidence, serde_json::to_string(&edge.metadata)?,
                        edge.valid_from.to_rfc3339(), edge.valid_to.map(|d| d.to_rfc3339()),
                    ],
                )?;
            }
            for r in &artifact.data.relations {
                tx.execute(
                    "INSERT OR IGNORE INTO entity_relations (id, project_id, from_entity, relation_type, to_entity, created_at)
                     VALUES (?1,?2,?3,?4,?5,?6)",
                    rusqlite::params![r.id, r.project_id, r.from_entity, r.relation_type, r.to_entity, r.created_at.to_rfc3339()],
                )?;
            }
            for res in &artifact.data.contradiction_resolutions {
                tx.execute(
                    "INSERT OR IGNORE INTO contradiction_resolutions
                     (id, project_id, memory_id_1, memory_id_2, edge_id, status, chosen_memory, note, resolved_at, created_at)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                    rusqlite::params![
                        res.id, res.project_id, res.memory_id_1, res.memory_id_2, res.edge_id, res.status,
                        res.chosen_memory, res.note, res.resolved_at.map(|d| d.to_rfc3339()), res.created_at.to_rfc3339(),
                    ],
                )?;
            }

            Ok(artifact.counts.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryType, StoreInput};

    #[test]
    fn snapshot_then_restore_replace_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_at(dir.path().join("a.db"), dir.path().to_path_buf()).unwrap();
        storage
            .store(StoreInput {
                content: "hello world".into(),
                memory_type: MemoryType::Fact,
                tags: vec![],
                importance: 0.5,
                confidence: 0.5,
                project_id: "p1".into(),
            })
            .unwrap();

        let path = storage.backup_snapshot("p1").unwrap();

        let dir2 = tempfile::tempdir().unwrap();
        let storage2 = Storage::open_at(dir2.path().join("b.db"), dir2.path().to_path_buf()).unwrap();
        // Copy artifact into storage2's own backup dir so the path-traversal
        // guard accepts it.
        std::fs::create_dir_all(storage2.backup_dir()).unwrap();
        let dest = storage2.backup_dir().join(path.file_name().unwrap());
        std::fs::copy(&path, &dest).unwrap();

        let counts = storage2.backup_restore(&dest, RestoreMode::Replace).unwrap();
        assert_eq!(counts.memories, 1);

        let memories = storage2.list_memories("p1", 10, false).unwrap();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0].content, "hello world");
    }

    #[test]
    fn restore_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_at(dir.path().join("a.db"), dir.path().to_path_buf()).unwrap();
        let evil = Path::new("../../etc/passwd");
        assert!(storage.backup_read(evil).is_err());
    }

    #[test]
    fn restore_rejects_payload_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open_at(dir.path().join("a.db"), dir.path().to_path_buf()).unwrap();
        std::fs::create_dir_all(storage.backup_dir()).unwrap();
        let path = storage.backup_dir().join("bad.json");
        std::fs::write(&path, b"{\"foo\": 1}").unwrap();
        assert!(storage.backup_read(&path).is_err());
    }
}
