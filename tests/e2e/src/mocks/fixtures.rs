//! Test data factory.
//!
//! Generates realistic memories for scenario tests: single stores, batches,
//! and a few pre-built scenarios (decay, search, temporal) that mirror how
//! an agent's memory actually accumulates over a session.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use just_memory_core::{Memory, MemoryType, Storage, StoreInput};

pub struct TestDataFactory;

/// Configuration for batch memory generation.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub count: usize,
    pub memory_type: Option<MemoryType>,
    pub content_prefix: String,
    pub tags: Vec<String>,
    pub project_id: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            count: 10,
            memory_type: None,
            content_prefix: "Test memory".to_string(),
            tags: vec![],
            project_id: "p1".to_string(),
        }
    }
}

/// A batch of related memories plus metadata for test assertions.
#[derive(Debug)]
pub struct TestScenario {
    pub memory_ids: Vec<String>,
    pub description: String,
    pub metadata: HashMap<String, String>,
}

const MEMORY_TYPES: [MemoryType; 5] =
    [MemoryType::Fact, MemoryType::Event, MemoryType::Observation, MemoryType::Note, MemoryType::Decision];

impl TestDataFactory {
    /// Store a single fact-type memory with default importance/confidence.
    pub fn create_memory(storage: &Storage, content: &str, project_id: &str) -> Option<Memory> {
        storage
            .store(StoreInput {
                content: content.to_string(),
                memory_type: MemoryType::Fact,
                tags: vec![],
                importance: 0.5,
                confidence: 0.5,
                project_id: project_id.to_string(),
            })
            .ok()
    }

    /// Store a memory with every field specified.
    #[allow(clippy::too_many_arguments)]
    pub fn create_memory_full(
        storage: &Storage,
        content: &str,
        memory_type: MemoryType,
        tags: Vec<&str>,
        importance: f64,
        confidence: f64,
        project_id: &str,
    ) -> Option<Memory> {
        storage
            .store(StoreInput {
                content: content.to_string(),
                memory_type,
                tags: tags.into_iter().map(String::from).collect(),
                importance,
                confidence,
                project_id: project_id.to_string(),
            })
            .ok()
    }

    /// Store a batch of memories, cycling through memory types unless a
    /// single type is pinned in `config`.
    pub fn create_batch(storage: &Storage, count: usize, project_id: &str) -> Vec<String> {
        Self::create_batch_with_config(storage, BatchConfig { count, project_id: project_id.to_string(), ..Default::default() })
    }

    pub fn create_batch_with_config(storage: &Storage, config: BatchConfig) -> Vec<String> {
        let mut ids = Vec::with_capacity(config.count);
        for i in 0..config.count {
            let memory_type = config.memory_type.unwrap_or(MEMORY_TYPES[i % MEMORY_TYPES.len()]);
            let input = StoreInput {
                content: format!("{} {}", config.content_prefix, i),
                memory_type,
                tags: config.tags.clone(),
                importance: 0.5,
                confidence: 0.5,
                project_id: config.project_id.clone(),
            };
            if let Ok(memory) = storage.store(input) {
                ids.push(memory.id);
            }
        }
        ids
    }

    /// Memories with differing access/confidence profiles, exercising the
    /// decay and recall-strength math on a real project's worth of rows.
    pub fn create_decay_scenario(storage: &Storage, project_id: &str) -> TestScenario {
        let mut ids = Vec::new();
        let mut metadata = HashMap::new();

        if let Some(m) = Self::create_memory_full(
            storage,
            "Well-established fact about photosynthesis",
            MemoryType::Fact,
            vec!["biology", "science"],
            0.8,
            0.9,
            project_id,
        ) {
            metadata.insert("high_confidence".to_string(), m.id.clone());
            ids.push(m.id);
        }

        if let Some(m) = Self::create_memory(storage, "Offhand observation nobody confirmed", project_id) {
            metadata.insert("low_confidence".to_string(), m.id.clone());
            ids.push(m.id);
        }

        if let Some(m) = Self::create_memory_full(
            storage,
            "Frequently recalled project convention",
            MemoryType::Decision,
            vec!["convention"],
            0.7,
            0.8,
            project_id,
        ) {
            for _ in 0..5 {
                let _ = storage.recall(&m.id);
            }
            metadata.insert("frequently_recalled".to_string(), m.id.clone());
            ids.push(m.id);
        }

        TestScenario {
            memory_ids: ids,
            description: "Decay scenario with varied confidence and access patterns".to_string(),
            metadata,
        }
    }

    /// Categorized content spanning three topics, used by search/ranking
    /// tests that need a query with one clear best match among distractors.
    pub fn create_search_scenario(storage: &Storage, project_id: &str) -> TestScenario {
        let mut ids = Vec::new();
        let mut metadata = HashMap::new();

        for content in [
            "Rust programming language uses ownership for memory safety",
            "Python is great for data science and machine learning",
            "JavaScript runs in web browsers and Node.js",
        ] {
            if let Some(m) = Self::create_memory_full(storage, content, MemoryType::Fact, vec!["programming", "code"], 0.5, 0.7, project_id) {
                ids.push(m.id);
            }
        }
        metadata.insert("programming_count".to_string(), "3".to_string());

        for content in [
            "Mitochondria is the powerhouse of the cell",
            "DNA contains genetic information",
            "Gravity is the force of attraction between masses",
        ] {
            if let Some(m) = Self::create_memory_full(storage, content, MemoryType::Fact, vec!["science"], 0.5, 0.7, project_id) {
                ids.push(m.id);
            }
        }
        metadata.insert("science_count".to_string(), "3".to_string());

        for content in ["To make pasta, boil water and add salt", "Chocolate cake requires cocoa powder and eggs"] {
            if let Some(m) = Self::create_memory_full(storage, content, MemoryType::Procedure, vec!["cooking", "recipes"], 0.5, 0.7, project_id) {
                ids.push(m.id);
            }
        }
        metadata.insert("recipe_count".to_string(), "2".to_string());

        TestScenario {
            memory_ids: ids,
            description: "Search scenario with categorized content".to_string(),
            metadata,
        }
    }

    /// Memories stored at different points relative to `now`, useful for
    /// exercising `list_memories` ordering and consolidation's age-based
    /// decay pass.
    pub fn create_temporal_scenario(storage: &Storage, project_id: &str) -> TestScenario {
        let mut ids = Vec::new();
        let mut metadata = HashMap::new();
        let now = Utc::now();

        if let Some(m) = Self::create_memory(storage, "Just stored memory", project_id) {
            metadata.insert("fresh".to_string(), m.id.clone());
            ids.push(m.id);
        }

        if let Some(m) = Self::create_memory(storage, "Memory stored a while ago", project_id) {
            storage
                .with_write(|conn| {
                    conn.execute(
                        "UPDATE memories SET created_at = ?1, last_accessed = ?1 WHERE id = ?2",
                        rusqlite::params![(now - Duration::days(90)).to_rfc3339(), m.id],
                    )?;
                    Ok(())
                })
                .unwrap();
            metadata.insert("aged".to_string(), m.id.clone());
            ids.push(m.id);
        }

        TestScenario {
            memory_ids: ids,
            description: "Temporal scenario with memories of different ages".to_string(),
            metadata,
        }
    }

    pub fn lorem_content(words: usize, seed: usize) -> String {
        const WORDS: [&str; 20] = [
            "the", "memory", "learning", "knowledge", "algorithm", "data", "system", "process", "function", "method",
            "class", "object", "variable", "constant", "type", "structure", "pattern", "design", "architecture", "code",
        ];
        (0..words).map(|i| WORDS[(seed + i * 7) % WORDS.len()]).collect::<Vec<_>>().join(" ")
    }

    pub fn generate_tags(count: usize, seed: usize) -> Vec<String> {
        const TAGS: [&str; 10] =
            ["important", "review", "todo", "concept", "fact", "code", "note", "idea", "question", "reference"];
        (0..count).map(|i| TAGS[(seed + i) % TAGS.len()].to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_memory_round_trips_content() {
        let storage = Storage::open_in_memory().unwrap();
        let memory = TestDataFactory::create_memory(&storage, "test content", "p1");
        assert_eq!(memory.unwrap().content, "test content");
    }

    #[test]
    fn create_batch_stores_requested_count() {
        let storage = Storage::open_in_memory().unwrap();
        let ids = TestDataFactory::create_batch(&storage, 10, "p1");
        assert_eq!(ids.len(), 10);
        let stats = storage.stats(Some("p1")).unwrap();
        assert_eq!(stats.total_memories, 10);
    }

    #[test]
    fn decay_scenario_populates_expected_keys() {
        let storage = Storage::open_in_memory().unwrap();
        let scenario = TestDataFactory::create_decay_scenario(&storage, "p1");
        assert!(!scenario.memory_ids.is_empty());
        assert!(scenario.metadata.contains_key("high_confidence"));
        assert!(scenario.metadata.contains_key("low_confidence"));
        assert!(scenario.metadata.contains_key("frequently_recalled"));
    }

    #[test]
    fn search_scenario_covers_three_topics() {
        let storage = Storage::open_in_memory().unwrap();
        let scenario = TestDataFactory::create_search_scenario(&storage, "p1");
        assert_eq!(scenario.memory_ids.len(), 8);
    }

    #[test]
    fn lorem_content_produces_requested_word_count() {
        let content = TestDataFactory::lorem_content(10, 42);
        assert_eq!(content.split_whitespace().count(), 10);
    }

    #[test]
    fn generate_tags_are_non_empty() {
        let tags = TestDataFactory::generate_tags(5, 0);
        assert_eq!(tags.len(), 5);
        assert!(tags.iter().all(|t| !t.is_empty()));
    }
}
