//! Test database manager.
//!
//! Isolated, disk-backed `Storage` instances for tests that need a real
//! path (backup/restore, anything crossing a process-restart boundary) —
//! `Storage::open_in_memory` is enough for everything else and is what the
//! rest of the suite reaches for first.

use std::path::PathBuf;

use just_memory_core::{Memory, MemoryType, Storage, StoreInput};
use tempfile::TempDir;

pub struct TestDatabaseManager {
    pub storage: Storage,
    _temp_dir: Option<TempDir>,
    db_path: PathBuf,
    snapshot: Option<Vec<Memory>>,
}

impl TestDatabaseManager {
    /// Database in a fresh temp directory, deleted when the manager drops.
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");
        let storage = Storage::open_at(db_path.clone(), temp_dir.path().to_path_buf()).expect("failed to open test storage");
        storage.seed_default_entity_types().expect("failed to seed entity types");

        Self { storage, _temp_dir: Some(temp_dir), db_path, snapshot: None }
    }

    /// Database at a caller-owned path, left on disk after the manager drops.
    pub fn new_at_path(data_dir: PathBuf) -> Self {
        let db_path = data_dir.join("test.db");
        let storage = Storage::open_at(db_path.clone(), data_dir).expect("failed to open test storage");
        storage.seed_default_entity_types().expect("failed to seed entity types");

        Self { storage, _temp_dir: None, db_path, snapshot: None }
    }

    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    pub fn is_empty(&self) -> bool {
        self.storage.stats(None).map(|s| s.total_memories == 0).unwrap_or(true)
    }

    pub fn memory_count(&self) -> i64 {
        self.storage.stats(None).map(|s| s.total_memories).unwrap_or(0)
    }

    /// Seed `count` plain fact memories in `project_id`.
    pub fn seed_memories(&self, count: usize, project_id: &str) -> Vec<String> {
        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let input = StoreInput {
                content: format!("Test memory content {i}"),
                memory_type: MemoryType::Fact,
                tags: vec![format!("test-{}", i % 5)],
                importance: 0.5,
                confidence: 0.5,
                project_id: project_id.to_string(),
            };
            if let Ok(memory) = self.storage.store(input) {
                ids.push(memory.id);
            }
        }
        ids
    }

    /// Seed `count_per_type` memories of each of the seven memory types.
    pub fn seed_diverse(&self, count_per_type: usize, project_id: &str) -> Vec<String> {
        const TYPES: [MemoryType; 7] = [
            MemoryType::Fact,
            MemoryType::Event,
            MemoryType::Observation,
            MemoryType::Preference,
            MemoryType::Note,
            MemoryType::Decision,
            MemoryType::Procedure,
        ];
        let mut ids = Vec::with_capacity(count_per_type * TYPES.len());
        for memory_type in TYPES {
            for i in 0..count_per_type {
                let input = StoreInput {
                    content: format!("Test {memory_type} content {i}"),
                    memory_type,
                    tags: vec![memory_type.to_string()],
                    importance: 0.5,
                    confidence: 0.5,
                    project_id: project_id.to_string(),
                };
                if let Ok(memory) = self.storage.store(input) {
                    ids.push(memory.id);
                }
            }
        }
        ids
    }

    /// Memories with different recall histories: fresh, lightly recalled,
    /// heavily recalled — exercises the strength/confidence math end to end.
    pub fn seed_with_recall_histories(&self, project_id: &str) -> Vec<String> {
        let mut ids = Vec::new();

        let fresh = self
            .storage
            .store(StoreInput {
                content: "New memory - never recalled".into(),
                memory_type: MemoryType::Fact,
                tags: vec!["new".into()],
                importance: 0.5,
                confidence: 0.5,
                project_id: project_id.to_string(),
            })
            .unwrap();
        ids.push(fresh.id);

        let well_recalled = self
            .storage
            .store(StoreInput {
                content: "Well-established memory - recalled often".into(),
                memory_type: MemoryType::Fact,
                tags: vec!["established".into()],
                importance: 0.5,
                confidence: 0.8,
                project_id: project_id.to_string(),
            })
            .unwrap();
        for _ in 0..5 {
            self.storage.recall(&well_recalled.id).unwrap();
        }
        ids.push(well_recalled.id);

        let contested = self
            .storage
            .store(StoreInput {
                content: "Disputed memory - contradicted more than once".into(),
                memory_type: MemoryType::Fact,
                tags: vec!["disputed".into()],
                importance: 0.5,
                confidence: 0.6,
                project_id: project_id.to_string(),
            })
            .unwrap();
        self.storage.contradict(&contested.id).unwrap();
        self.storage.contradict(&contested.id).unwrap();
        ids.push(contested.id);

        ids
    }

    /// Take a snapshot of every active memory in `project_id`.
    pub fn take_snapshot(&mut self, project_id: &str) {
        let memories = self.storage.list_memories(project_id, usize::MAX, false).unwrap_or_default();
        self.snapshot = Some(memories);
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Restore the database to an empty state matching the last snapshot's
    /// content (new ids are assigned; this is a content restore, not an
    /// id-preserving one).
    pub fn restore_snapshot(&mut self) -> bool {
        let Some(memories) = self.snapshot.take() else {
            return false;
        };
        self.recreate();
        for memory in memories {
            let _ = self.storage.store(StoreInput {
                content: memory.content,
                memory_type: memory.memory_type,
                tags: memory.tags,
                importance: memory.importance,
                confidence: memory.confidence,
                project_id: memory.project_id,
            });
        }
        true
    }

    /// Soft-delete every memory in every project this manager has touched.
    pub fn clear(&self, project_id: &str) {
        if let Ok(memories) = self.storage.list_memories(project_id, usize::MAX, false) {
            for memory in memories {
                let _ = self.storage.delete_memory(&memory.id, true);
            }
        }
    }

    /// Drop and reopen storage at the same path, as if the process restarted.
    pub fn recreate(&mut self) {
        let data_dir = self.db_path.parent().unwrap().to_path_buf();
        let _ = std::fs::remove_file(&self.db_path);
        self.storage = Storage::open_at(self.db_path.clone(), data_dir).expect("failed to recreate storage");
        self.storage.seed_default_entity_types().expect("failed to reseed entity types");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_database_starts_empty_on_disk() {
        let db = TestDatabaseManager::new_temp();
        assert!(db.is_empty());
        assert!(db.path().exists());
    }

    #[test]
    fn seed_memories_reports_stored_count() {
        let db = TestDatabaseManager::new_temp();
        let ids = db.seed_memories(10, "p1");
        assert_eq!(ids.len(), 10);
        assert_eq!(db.memory_count(), 10);
    }

    #[test]
    fn seed_diverse_covers_every_memory_type() {
        let db = TestDatabaseManager::new_temp();
        let ids = db.seed_diverse(3, "p1");
        assert_eq!(ids.len(), 21);
        assert_eq!(db.memory_count(), 21);
    }

    #[test]
    fn clear_soft_deletes_everything_in_project() {
        let db = TestDatabaseManager::new_temp();
        db.seed_memories(5, "p1");
        assert_eq!(db.memory_count(), 5);
        db.clear("p1");
        let remaining = db.storage.list_memories("p1", 10, false).unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn snapshot_restore_repopulates_content() {
        let mut db = TestDatabaseManager::new_temp();
        db.seed_memories(5, "p1");

        db.take_snapshot("p1");
        assert!(db.has_snapshot());

        db.restore_snapshot();
        assert_eq!(db.memory_count(), 5);
    }
}
