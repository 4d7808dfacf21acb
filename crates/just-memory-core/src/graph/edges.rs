//! Bi-temporal edges.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::memory::GLOBAL_PROJECT;
use crate::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Both,
}

/// Bi-temporal relation between two memories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub project_id: String,
    pub from_id: String,
    pub to_id: String,
    pub relation_type: String,
    pub confidence: f64,
    pub metadata: Value,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
}

impl Edge {
    pub fn is_valid(&self) -> bool {
        self.valid_to.is_none()
    }
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<Edge> {
    let metadata_json: String = row.get("metadata")?;
    Ok(Edge {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        from_id: row.get("from_id")?,
        to_id: row.get("to_id")?,
        relation_type: row.get("relation_type")?,
        confidence: row.get("confidence")?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or(Value::Null),
        valid_from: row.get("valid_from")?,
        valid_to: row.get("valid_to")?,
    })
}

const SELECT: &str = "id, project_id, from_id, to_id, relation_type, confidence, metadata, valid_from, valid_to";

impl Storage {
    pub fn edge_create(
        &self,
        from_id: &str,
        to_id: &str,
        relation_type: &str,
        confidence: f64,
        metadata: Value,
        project_id: &str,
    ) -> Result<Edge> {
        crate::memory::validate_unit_interval(confidence, "confidence")?;
        let id = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO edges (id, project_id, from_id, to_id, relation_type, confidence, metadata, valid_from, valid_to)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,NULL)",
                params![id, project_id, from_id, to_id, relation_type, confidence, serde_json::to_string(&metadata)?, now.to_rfc3339()],
            )?;
            Ok(())
        })?;
        self.edge_get(&id)?.ok_or_else(|| CoreError::NotFound(id.clone()))
    }

    pub fn edge_get(&self, id: &str) -> Result<Option<Edge>> {
        self.with_read(|conn| {
            conn.query_row(&format!("SELECT {SELECT} FROM edges WHERE id = ?1"), params![id], row_to_edge)
                .optional()
                .map_err(CoreError::from)
        })
    }

    /// Incident edges for `memory_id`, scoped to `project_id` or `"global"`.
    pub fn edge_query(
        &self,
        memory_id: &str,
        direction: Direction,
        project_id: &str,
        include_invalidated: bool,
    ) -> Result<Vec<Edge>> {
        self.with_read(|conn| {
            let predicate = match direction {
                Direction::Out => "from_id = ?1",
                Direction::In => "to_id = ?1",
                Direction::Both => "(from_id = ?1 OR to_id = ?1)",
            };
            let validity = if include_invalidated { "" } else { "AND valid_to IS NULL" };
            let sql = format!(
                "SELECT {SELECT} FROM edges WHERE {predicate} AND (project_id = ?2 OR project_id = '{GLOBAL_PROJECT}') {validity}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![memory_id, project_id], row_to_edge)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Monotonic invalidation — `valid_to` once set is never cleared.
    pub fn edge_invalidate(&self, edge_id: &str) -> Result<Edge> {
        let existing = self.edge_get(edge_id)?.ok_or_else(|| CoreError::not_found(format!("edge {edge_id}")))?;
        if existing.valid_to.is_some() {
            return Ok(existing);
        }
        let now = Utc::now();
        self.with_write(|conn| {
            conn.execute(
                "UPDATE edges SET valid_to = ?1 WHERE id = ?2 AND valid_to IS NULL",
                params![now.to_rfc3339(), edge_id],
            )?;
            Ok(())
        })?;
        self.edge_get(edge_id)?.ok_or_else(|| CoreError::not_found(format!("edge {edge_id}")))
    }

    pub(crate) fn list_edges_for_backup(&self, project_id: &str) -> Result<Vec<Edge>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {SELECT} FROM edges WHERE project_id = ?1"))?;
            let rows = stmt
                .query_map(params![project_id], row_to_edge)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryType, StoreInput};

    fn seed_memory(storage: &Storage, content: &str) -> String {
        storage
            .store(StoreInput {
                content: content.into(),
                memory_type: MemoryType::Fact,
                tags: vec![],
                importance: 0.5,
                confidence: 0.5,
                project_id: "p1".into(),
            })
            .unwrap()
            .id
    }

    #[test]
    fn invalidation_is_monotonic() {
        let storage = Storage::open_in_memory().unwrap();
        let a = seed_memory(&storage, "a");
        let b = seed_memory(&storage, "b");
        let edge = storage.edge_create(&a, &b, "relates_to", 0.9, Value::Null, "p1").unwrap();
        assert!(edge.is_valid());

        let invalidated = storage.edge_invalidate(&edge.id).unwrap();
        assert!(!invalidated.is_valid());
        let first_ts = invalidated.valid_to.unwrap();

        // Re-invalidating must not clear or move valid_to.
        let again = storage.edge_invalidate(&edge.id).unwrap();
        assert_eq!(again.valid_to.unwrap(), first_ts);
    }

    #[test]
    fn query_respects_project_scope_and_direction() {
        let storage = Storage::open_in_memory().unwrap();
        let a = seed_memory(&storage, "a");
        let b = seed_memory(&storage, "b");
        storage.edge_create(&a, &b, "relates_to", 0.9, Value::Null, "p1").unwrap();

        let out = storage.edge_query(&a, Direction::Out, "p1", false).unwrap();
        assert_eq!(out.len(), 1);
        let inbound = storage.edge_query(&a, Direction::In, "p1", false).unwrap();
        assert!(inbound.is_empty());
        let other_project = storage.edge_query(&a, Direction::Out, "other", false).unwrap();
        assert!(other_project.is_empty());
    }
}
