//! Briefing & Stats (C11).
//!
//! Read-only aggregation over the other components: a session-resume
//! briefing, project-wide counters, and a keyword-weighted suggestion
//! helper. Nothing here mutates storage except the briefing sequence
//! counter it reads through the Session component.

use chrono::Utc;
use rusqlite::params;
use serde::Serialize;

use crate::error::Result;
use crate::graph::{Entity, CONTRADICTION_PREFIX};
use crate::memory::Memory;
use crate::session::CrashState;
use crate::storage::Storage;

const DEFAULT_TOP_N: usize = 10;
const ENTITY_OBSERVATION_PREVIEW: usize = 3;
const SUGGEST_MIN_WORD_LEN: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct EntitySummary {
    pub name: String,
    pub entity_type: String,
    pub observations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Briefing {
    pub crash: CrashState,
    pub current_task: Option<crate::session::TaskState>,
    pub top_confidence_memories: Vec<Memory>,
    pub recent_memories: Vec<Memory>,
    pub recent_entities: Vec<EntitySummary>,
    pub briefing_seq: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct TypeBreakdown {
    pub memory_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Stats {
    pub total_memories: i64,
    pub active_memories: i64,
    pub total_entities: i64,
    pub total_edges: i64,
    pub contradiction_edges: i64,
    pub average_base_confidence: f64,
    pub by_type: Vec<TypeBreakdown>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub memory: Memory,
    pub score: f64,
}

impl Storage {
    /// Compose a session-resume briefing for `project_id`. `session_id` is
    /// the caller's current process session id, used for crash detection.
    pub fn briefing(&self, project_id: &str, session_id: &str) -> Result<Briefing> {
        let crash = self.check_crash(project_id, session_id)?;
        let current_task = self.task_get(project_id)?;

        let mut top_confidence_memories = self.list_memories(project_id, 200, false)?;
        let now = Utc::now();
        top_confidence_memories
            .sort_by(|a, b| b.effective_confidence(now).partial_cmp(&a.effective_confidence(now)).unwrap());
        top_confidence_memories.truncate(DEFAULT_TOP_N);

        let recent_memories = self.list_memories(project_id, DEFAULT_TOP_N, false)?;

        let recent_entities = self
            .entity_list_recent(project_id, DEFAULT_TOP_N)?
            .into_iter()
            .map(|e| truncate_entity(&e))
            .collect();

        let briefing_seq = self.briefing_seq_increment(project_id)?;

        Ok(Briefing {
            crash,
            current_task,
            top_confidence_memories,
            recent_memories,
            recent_entities,
            briefing_seq,
        })
    }

    /// Project counters. `project_id = None` aggregates across every
    /// project.
    pub fn stats(&self, project_id: Option<&str>) -> Result<Stats> {
        self.with_read(|conn| {
            let scope = project_id.is_some();
            let total_memories: i64 = if scope {
                conn.query_row("SELECT COUNT(*) FROM memories WHERE project_id = ?1", params![project_id], |r| r.get(0))?
            } else {
                conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))?
            };
            let active_memories: i64 = if scope {
                conn.query_row(
                    "SELECT COUNT(*) FROM memories WHERE project_id = ?1 AND deleted_at IS NULL",
                    params![project_id],
                    |r| r.get(0),
                )?
            } else {
                conn.query_row("SELECT COUNT(*) FROM memories WHERE deleted_at IS NULL", [], |r| r.get(0))?
            };
            let total_entities: i64 = if scope {
                conn.query_row("SELECT COUNT(*) FROM entities WHERE project_id = ?1", params![project_id], |r| r.get(0))?
            } else {
                conn.query_row("SELECT COUNT(*) FROM entities", [], |r| r.get(0))?
            };
            let total_edges: i64 = if scope {
                conn.query_row("SELECT COUNT(*) FROM edges WHERE project_id = ?1", params![project_id], |r| r.get(0))?
            } else {
                conn.query_row("SELECT COUNT(*) FROM edges", [], |r| r.get(0))?
            };
            let contradiction_pattern = format!("{CONTRADICTION_PREFIX}%");
            let contradiction_edges: i64 = if scope {
                conn.query_row(
                    "SELECT COUNT(*) FROM edges WHERE project_id = ?1 AND relation_type LIKE ?2",
                    params![project_id, contradiction_pattern],
                    |r| r.get(0),
                )?
            } else {
                conn.query_row("SELECT COUNT(*) FROM edges WHERE relation_type LIKE ?1", params![contradiction_pattern], |r| r.get(0))?
            };
            let average_base_confidence: f64 = if scope {
                conn.query_row(
                    "SELECT COALESCE(AVG(confidence), 0.0) FROM memories WHERE project_id = ?1 AND deleted_at IS NULL",
                    params![project_id],
                    |r| r.get(0),
                )?
            } else {
                conn.query_row("SELECT COALESCE(AVG(confidence), 0.0) FROM memories WHERE deleted_at IS NULL", [], |r| r.get(0))?
            };

            let by_type = {
                let sql = if scope {
                    "SELECT memory_type, COUNT(*) FROM memories WHERE project_id = ?1 AND deleted_at IS NULL GROUP BY memory_type"
                } else {
                    "SELECT memory_type, COUNT(*) FROM memories WHERE deleted_at IS NULL GROUP BY memory_type"
                };
                let mut stmt = conn.prepare(sql)?;
                let rows: Vec<TypeBreakdown> = if scope {
                    stmt.query_map(params![project_id], |r| Ok(TypeBreakdown { memory_type: r.get(0)?, count: r.get(1)? }))?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                } else {
                    stmt.query_map([], |r| Ok(TypeBreakdown { memory_type: r.get(0)?, count: r.get(1)? }))?
                        .collect::<rusqlite::Result<Vec<_>>>()?
                };
                rows
            };

            Ok(Stats {
                total_memories,
                active_memories,
                total_entities,
                total_edges,
                contradiction_edges,
                average_base_confidence,
                by_type,
            })
        })
    }

    /// Extract content words longer than `SUGGEST_MIN_WORD_LEN` characters
    /// from `text`, then rank memories by how many of those words their
    /// content shares (a crude weighted keyword match). Empty input with no
    /// long-enough words yields an empty suggestion list.
    pub fn suggest_from_context(&self, text: &str, project_id: &str, limit: usize) -> Result<Vec<Suggestion>> {
        let words: std::collections::HashSet<String> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| w.len() > SUGGEST_MIN_WORD_LEN)
            .collect();
        if words.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self.list_memories(project_id, 500, false)?;
        let mut scored: Vec<Suggestion> = candidates
            .into_iter()
            .filter_map(|memory| {
                let content_lower = memory.content.to_lowercase();
                let hits = words.iter().filter(|w| content_lower.contains(w.as_str())).count();
                if hits == 0 {
                    return None;
                }
                Some(Suggestion { score: hits as f64 / words.len() as f64, memory })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        scored.truncate(limit);
        Ok(scored)
    }

    /// Every distinct `project_id` with at least one row in any
    /// project-scoped table, plus the reserved `"global"` project, always
    /// present even with no rows of its own.
    pub fn list_projects(&self) -> Result<Vec<String>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT project_id FROM memories
                 UNION SELECT project_id FROM entities
                 UNION SELECT project_id FROM edges
                 UNION SELECT project_id FROM scheduled_tasks
                 ORDER BY 1",
            )?;
            let mut projects: Vec<String> =
                stmt.query_map([], |r| r.get(0))?.collect::<rusqlite::Result<Vec<_>>>()?;
            if !projects.iter().any(|p| p == crate::memory::GLOBAL_PROJECT) {
                projects.push(crate::memory::GLOBAL_PROJECT.to_string());
                projects.sort();
            }
            Ok(projects)
        })
    }
}

fn truncate_entity(entity: &Entity) -> EntitySummary {
    EntitySummary {
        name: entity.name.clone(),
        entity_type: entity.entity_type.clone(),
        observations: entity.observations.iter().take(ENTITY_OBSERVATION_PREVIEW).cloned().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryType, StoreInput};

    fn seed(storage: &Storage, content: &str, confidence: f64) -> String {
        storage
            .store(StoreInput {
                content: content.into(),
                memory_type: MemoryType::Fact,
                tags: vec![],
                importance: 0.5,
                confidence,
                project_id: "p1".into(),
            })
            .unwrap()
            .id
    }

    #[test]
    fn briefing_reports_no_crash_on_fresh_session() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage, "fact one", 0.9);
        let briefing = storage.briefing("p1", "session-1").unwrap();
        assert!(!briefing.crash.crashed);
        assert_eq!(briefing.briefing_seq, 1);
        assert!(!briefing.top_confidence_memories.is_empty());
    }

    #[test]
    fn stats_counts_memories_and_confidence() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage, "fact one", 0.8);
        seed(&storage, "fact two", 0.4);
        let stats = storage.stats(Some("p1")).unwrap();
        assert_eq!(stats.total_memories, 2);
        assert_eq!(stats.active_memories, 2);
        assert!((stats.average_base_confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn suggest_returns_empty_for_short_words_only() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage, "something relevant here", 0.5);
        let suggestions = storage.suggest_from_context("a an if", "p1", 5).unwrap();
        assert!(suggestions.is_empty());
    }

    #[test]
    fn suggest_ranks_by_shared_word_count() {
        let storage = Storage::open_in_memory().unwrap();
        seed(&storage, "rust programming language memory safety", 0.5);
        seed(&storage, "unrelated topic about gardening", 0.5);
        let suggestions = storage.suggest_from_context("rust memory safety programming", "p1", 5).unwrap();
        assert_eq!(suggestions.len(), 1);
        assert!(suggestions[0].memory.content.contains("rust"));
    }
}
