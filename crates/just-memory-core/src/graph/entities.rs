//! Named entities and entity relations.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::storage::Storage;

pub const MAX_NAME_CHARS: usize = 200;
pub const MAX_OBSERVATIONS: usize = 100;
pub const MAX_OBSERVATION_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRelation {
    pub id: String,
    pub project_id: String,
    pub from_entity: String,
    pub relation_type: String,
    pub to_entity: String,
    pub created_at: DateTime<Utc>,
}

fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<Entity> {
    let obs_json: String = row.get("observations")?;
    Ok(Entity {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        name: row.get("name")?,
        entity_type: row.get("entity_type")?,
        observations: serde_json::from_str(&obs_json).unwrap_or_default(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_relation(row: &rusqlite::Row) -> rusqlite::Result<EntityRelation> {
    Ok(EntityRelation {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        from_entity: row.get("from_entity")?,
        relation_type: row.get("relation_type")?,
        to_entity: row.get("to_entity")?,
        created_at: row.get("created_at")?,
    })
}

const ENTITY_SELECT: &str = "id, project_id, name, entity_type, observations, created_at, updated_at";
const RELATION_SELECT: &str = "id, project_id, from_entity, relation_type, to_entity, created_at";

fn truncate_observation(s: &str) -> String {
    if s.chars().count() > MAX_OBSERVATION_CHARS {
        s.chars().take(MAX_OBSERVATION_CHARS).collect()
    } else {
        s.to_string()
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().count() > MAX_NAME_CHARS {
        return Err(CoreError::validation(format!("entity name must be 1..={MAX_NAME_CHARS} chars")));
    }
    Ok(())
}

impl Storage {
    /// Upsert-by-name: creating a duplicate `(project_id, name)` merges
    /// observations as a set union, never overwrites.
    pub fn entity_create(
        &self,
        name: &str,
        entity_type: &str,
        observations: Vec<String>,
        project_id: &str,
    ) -> Result<(Entity, bool)> {
        validate_name(name)?;
        if observations.len() > MAX_OBSERVATIONS {
            return Err(CoreError::validation(format!("at most {MAX_OBSERVATIONS} observations")));
        }
        if !self.entity_type_exists(entity_type)? {
            return Err(CoreError::validation(format!("unknown entity type: {entity_type}")));
        }

        let observations: Vec<String> = observations.iter().map(|o| truncate_observation(o)).collect();
        let now = Utc::now();

        if let Some(existing) = self.entity_get(name, project_id)? {
            let mut merged: BTreeSet<String> = existing.observations.into_iter().collect();
            let before = merged.len();
            merged.extend(observations);
            let merged: Vec<String> = merged.into_iter().collect();
            let changed = merged.len() != before;
            self.with_write(|conn| {
                conn.execute(
                    "UPDATE entities SET observations = ?1, updated_at = ?2 WHERE project_id = ?3 AND name = ?4",
                    params![serde_json::to_string(&merged)?, now.to_rfc3339(), project_id, name],
                )?;
                Ok(())
            })?;
            let entity = self.entity_get(name, project_id)?.ok_or_else(|| CoreError::not_found("entity"))?;
            return Ok((entity, changed));
        }

        let id = Uuid::new_v4().simple().to_string();
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO entities (id, project_id, name, entity_type, observations, created_at, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?6)",
                params![id, project_id, name, entity_type, serde_json::to_string(&observations)?, now.to_rfc3339()],
            )?;
            Ok(())
        })?;
        let entity = self.entity_get(name, project_id)?.ok_or_else(|| CoreError::not_found("entity"))?;
        Ok((entity, true))
    }

    pub fn entity_get(&self, name: &str, project_id: &str) -> Result<Option<Entity>> {
        self.with_read(|conn| {
            conn.query_row(
                &format!("SELECT {ENTITY_SELECT} FROM entities WHERE project_id = ?1 AND name = ?2"),
                params![project_id, name],
                row_to_entity,
            )
            .optional()
            .map_err(CoreError::from)
        })
    }

    pub fn entity_get_by_id(&self, id: &str) -> Result<Option<Entity>> {
        self.with_read(|conn| {
            conn.query_row(&format!("SELECT {ENTITY_SELECT} FROM entities WHERE id = ?1"), params![id], row_to_entity)
                .optional()
                .map_err(CoreError::from)
        })
    }

    /// Substring search over name and observation content, filterable by type.
    pub fn entity_search(&self, query: &str, project_id: &str, entity_type: Option<&str>) -> Result<Vec<Entity>> {
        let needle = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        self.with_read(|conn| {
            let sql = format!(
                "SELECT {ENTITY_SELECT} FROM entities WHERE project_id = ?1
                 AND (name LIKE ?2 ESCAPE '\\' OR observations LIKE ?2 ESCAPE '\\')
                 {}",
                if entity_type.is_some() { "AND entity_type = ?3" } else { "" }
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = if let Some(t) = entity_type {
                stmt.query_map(params![project_id, needle, t], row_to_entity)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            } else {
                stmt.query_map(params![project_id, needle], row_to_entity)?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };
            Ok(rows)
        })
    }

    /// Most-recently-updated entities for a project, for briefing summaries.
    pub fn entity_list_recent(&self, project_id: &str, limit: usize) -> Result<Vec<Entity>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTITY_SELECT} FROM entities WHERE project_id = ?1 ORDER BY updated_at DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![project_id, limit as i64], row_to_entity)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Append-merge observations onto an existing entity.
    pub fn entity_observe(&self, name: &str, project_id: &str, observations: Vec<String>) -> Result<Entity> {
        let existing = self
            .entity_get(name, project_id)?
            .ok_or_else(|| CoreError::not_found(format!("entity {name}")))?;
        let mut merged: BTreeSet<String> = existing.observations.into_iter().collect();
        merged.extend(observations.iter().map(|o| truncate_observation(o)));
        if merged.len() > MAX_OBSERVATIONS {
            return Err(CoreError::validation(format!("at most {MAX_OBSERVATIONS} observations")));
        }
        let merged: Vec<String> = merged.into_iter().collect();
        self.with_write(|conn| {
            conn.execute(
                "UPDATE entities SET observations = ?1, updated_at = ?2 WHERE project_id = ?3 AND name = ?4",
                params![serde_json::to_string(&merged)?, Utc::now().to_rfc3339(), project_id, name],
            )?;
            Ok(())
        })?;
        self.entity_get(name, project_id)?.ok_or_else(|| CoreError::not_found(format!("entity {name}")))
    }

    /// Directed link between two entities by name; duplicates are dropped.
    pub fn entity_link(&self, from: &str, relation_type: &str, to: &str, project_id: &str) -> Result<()> {
        let id = Uuid::new_v4().simple().to_string();
        self.with_write(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO entity_relations (id, project_id, from_entity, relation_type, to_entity, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6)",
                params![id, project_id, from, relation_type, to, Utc::now().to_rfc3339()],
            )?;
            Ok(())
        })
    }

    /// Delete an entity, cascading only to its incoming/outgoing relations
    /// within its project.
    pub fn entity_delete(&self, name: &str, project_id: &str) -> Result<()> {
        self.entity_get(name, project_id)?.ok_or_else(|| CoreError::not_found(format!("entity {name}")))?;
        self.with_write(|conn| {
            conn.execute(
                "DELETE FROM entity_relations WHERE project_id = ?1 AND (from_entity = ?2 OR to_entity = ?2)",
                params![project_id, name],
            )?;
            conn.execute("DELETE FROM entities WHERE project_id = ?1 AND name = ?2", params![project_id, name])?;
            Ok(())
        })
    }

    pub(crate) fn list_entities_for_backup(&self, project_id: &str) -> Result<Vec<Entity>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {ENTITY_SELECT} FROM entities WHERE project_id = ?1"))?;
            let rows = stmt.query_map(params![project_id], row_to_entity)?.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub(crate) fn list_relations_for_backup(&self, project_id: &str) -> Result<Vec<EntityRelation>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(&format!("SELECT {RELATION_SELECT} FROM entity_relations WHERE project_id = ?1"))?;
            let rows = stmt.query_map(params![project_id], row_to_relation)?.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}
