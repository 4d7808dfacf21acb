//! Replicates `just-memory-mcp`'s `memory_store` orchestration
//! (store → embed → proactive contradiction detection) against the real
//! `just-memory-core` API, without a model gateway: no embeddings are
//! produced, so `contradiction::detect` runs in its symbolic-only mode
//! (`similarity = None`, which skips the pre-filter and the NLI stage).
//! This is enough to exercise the symbolic detectors (negation, antonym,
//! factual, temporal) end to end the way a real store call does.

use just_memory_core::contradiction::{self, ContradictionKind};
use just_memory_core::gateway::GatewayResult;
use just_memory_core::graph::contradiction_relation_type;
use just_memory_core::memory::{Memory, MemoryType, StoreInput};
use just_memory_core::storage::Storage;
use just_memory_core::Result;

/// One contradiction signal recorded during [`store_with_contradiction_check`].
#[derive(Debug, Clone)]
pub struct RecordedContradiction {
    pub other_memory_id: String,
    pub kind: ContradictionKind,
    pub edge_id: String,
}

/// Store a memory, then run proactive contradiction detection against every
/// other non-deleted memory in the project, recording a
/// `contradiction_<kind>` edge and a pending resolution for each signal.
/// Mirrors `just-memory-mcp::tools::memory::execute_store`'s `detect_and_record`.
pub fn store_with_contradiction_check(
    storage: &Storage,
    content: &str,
    memory_type: MemoryType,
    project_id: &str,
) -> Result<(Memory, Vec<RecordedContradiction>)> {
    let memory = storage.store(StoreInput {
        content: content.to_string(),
        memory_type,
        tags: vec![],
        importance: 0.5,
        confidence: 0.8,
        project_id: project_id.to_string(),
    })?;

    let mut found = Vec::new();
    for candidate in storage.list_memories(project_id, 200, false)? {
        if candidate.id == memory.id {
            continue;
        }
        for signal in contradiction::detect(&memory.content, &candidate.content, None, GatewayResult::NotAvailable) {
            let relation_type = contradiction_relation_type(signal.kind.as_str());
            let edge = storage.edge_create(&memory.id, &candidate.id, &relation_type, signal.similarity as f64, serde_json::Value::Null, project_id)?;
            storage.contradiction_record(project_id, &memory.id, &candidate.id, &edge.id)?;
            storage.bump_contradiction_count(&memory.id)?;
            storage.bump_contradiction_count(&candidate.id)?;
            found.push(RecordedContradiction { other_memory_id: candidate.id.clone(), kind: signal.kind, edge_id: edge.id });
        }
    }

    Ok((memory, found))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_contradiction_is_recorded_as_factual() {
        let storage = Storage::open_in_memory().unwrap();
        let (first, _) = store_with_contradiction_check(&storage, "The project default port is 3000", MemoryType::Fact, "p1").unwrap();
        let (_second, found) = store_with_contradiction_check(&storage, "The project default port is 8080", MemoryType::Fact, "p1").unwrap();

        assert!(found.iter().any(|c| c.other_memory_id == first.id && c.kind == ContradictionKind::Factual));
        let refreshed_first = storage.get_memory_row(&first.id).unwrap().unwrap();
        assert!(refreshed_first.contradiction_count >= 1);
    }
}
