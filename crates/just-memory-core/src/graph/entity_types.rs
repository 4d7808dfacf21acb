//! Entity type hierarchy.

use rusqlite::{params, OptionalExtension};

use crate::error::{CoreError, Result};
use crate::storage::Storage;

/// Eight default types that must be seeded.
pub const DEFAULT_ENTITY_TYPES: &[&str] = &[
    "concept",
    "person",
    "project",
    "technology",
    "organization",
    "location",
    "event",
    "document",
];

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace(' ', "_")
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct EntityTypeHierarchy {
    pub ancestors: Vec<String>,
    pub descendants: Vec<String>,
    pub depth: usize,
}

impl Storage {
    /// Seed the eight default entity types, idempotently.
    pub fn seed_default_entity_types(&self) -> Result<()> {
        self.with_write(|conn| {
            for name in DEFAULT_ENTITY_TYPES {
                conn.execute(
                    "INSERT OR IGNORE INTO entity_types (name, parent_type, description) VALUES (?1, NULL, '')",
                    params![name],
                )?;
            }
            Ok(())
        })
    }

    pub fn entity_type_exists(&self, name: &str) -> Result<bool> {
        let name = normalize(name);
        self.with_read(|conn| {
            let exists: bool = conn
                .query_row("SELECT 1 FROM entity_types WHERE name = ?1", params![name], |_| Ok(true))
                .optional()?
                .unwrap_or(false);
            Ok(exists)
        })
    }

    fn parent_of(&self, name: &str) -> Result<Option<String>> {
        self.with_read(|conn| {
            conn.query_row("SELECT parent_type FROM entity_types WHERE name = ?1", params![name], |r| r.get(0))
                .optional()
                .map_err(CoreError::from)
        })
    }

    /// Define (or redefine) an entity type. Normalizes the name, verifies
    /// the parent exists, and refuses cycles by walking ancestors first.
    pub fn entity_type_define(&self, name: &str, parent: Option<&str>, description: &str) -> Result<()> {
        let name = normalize(name);
        let parent = parent.map(normalize);

        if let Some(ref p) = parent {
            if !self.entity_type_exists(p)? {
                return Err(CoreError::validation(format!("unknown parent type: {p}")));
            }
            // Walk ancestors of `parent`; if `name` appears, defining this
            // edge would create a cycle.
            let mut cursor = Some(p.clone());
            let mut seen = std::collections::HashSet::new();
            while let Some(cur) = cursor {
                if cur == name {
                    return Err(CoreError::InvariantViolation(format!(
                        "defining {name} -> {p} would create a cycle"
                    )));
                }
                if !seen.insert(cur.clone()) {
                    break;
                }
                cursor = self.parent_of(&cur)?;
            }
        }

        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO entity_types (name, parent_type, description) VALUES (?1, ?2, ?3)
                 ON CONFLICT(name) DO UPDATE SET parent_type = excluded.parent_type, description = excluded.description",
                params![name, parent, description],
            )?;
            Ok(())
        })
    }

    pub fn entity_type_list(&self) -> Result<Vec<(String, Option<String>, String)>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare("SELECT name, parent_type, description FROM entity_types ORDER BY name")?;
            let rows = stmt
                .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn entity_type_ancestors(&self, name: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut cursor = self.parent_of(&normalize(name))?;
        let mut seen = std::collections::HashSet::new();
        while let Some(cur) = cursor {
            if !seen.insert(cur.clone()) {
                break;
            }
            out.push(cur.clone());
            cursor = self.parent_of(&cur)?;
        }
        Ok(out)
    }

    pub fn entity_type_descendants(&self, name: &str) -> Result<Vec<String>> {
        let name = normalize(name);
        let all = self.entity_type_list()?;
        let mut out = Vec::new();
        let mut frontier = vec![name];
        loop {
            let mut next = Vec::new();
            for (child_name, parent, _) in &all {
                if let Some(p) = parent {
                    if frontier.contains(p) && !out.contains(child_name) {
                        out.push(child_name.clone());
                        next.push(child_name.clone());
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(out)
    }

    pub fn entity_type_hierarchy(&self, name: &str) -> Result<EntityTypeHierarchy> {
        let ancestors = self.entity_type_ancestors(name)?;
        let descendants = self.entity_type_descendants(name)?;
        Ok(EntityTypeHierarchy { depth: ancestors.len(), ancestors, descendants })
    }

    /// Expand `type` to `{type} ∪ descendants(type)` and search entities.
    pub fn search_by_type_hierarchy(&self, entity_type: &str, query: &str, project_id: &str) -> Result<Vec<crate::graph::Entity>> {
        let mut types = self.entity_type_descendants(entity_type)?;
        types.push(normalize(entity_type));

        let mut out = Vec::new();
        for t in types {
            out.extend(self.entity_search(query, project_id, Some(&t))?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_twice_leaves_eight_rows() {
        let storage = Storage::open_in_memory().unwrap();
        storage.seed_default_entity_types().unwrap();
        storage.seed_default_entity_types().unwrap();
        assert_eq!(storage.entity_type_list().unwrap().len(), 8);
    }

    #[test]
    fn cycle_is_rejected() {
        let storage = Storage::open_in_memory().unwrap();
        storage.entity_type_define("a", None, "").unwrap();
        storage.entity_type_define("b", Some("a"), "").unwrap();
        assert!(storage.entity_type_define("a", Some("b"), "").is_err());
    }

    #[test]
    fn hierarchy_reports_ancestors_and_descendants() {
        let storage = Storage::open_in_memory().unwrap();
        storage.entity_type_define("animal", None, "").unwrap();
        storage.entity_type_define("dog", Some("animal"), "").unwrap();
        storage.entity_type_define("puppy", Some("dog"), "").unwrap();

        let h = storage.entity_type_hierarchy("dog").unwrap();
        assert_eq!(h.ancestors, vec!["animal".to_string()]);
        assert_eq!(h.descendants, vec!["puppy".to_string()]);
    }
}
