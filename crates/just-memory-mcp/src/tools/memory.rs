//! Memory family: `memory_store`, `memory_recall`, `memory_update`,
//! `memory_delete`, `memory_list`, `memory_search`, `memory_stats`,
//! `memory_suggest`, `memory_find_contradictions`.

use std::sync::Arc;

use just_memory_core::contradiction;
use just_memory_core::error::{CoreError, Result};
use just_memory_core::gateway::{cosine_similarity, GatewayResult, ModelGateway};
use just_memory_core::graph::contradiction_relation_type;
use just_memory_core::memory::{MemoryType, MemoryUpdate, StoreInput};
use just_memory_core::search::{search_contextual, search_hybrid, search_semantic, SpreadingActivationConfig};
use just_memory_core::storage::Storage;
use serde::Deserialize;
use serde_json::Value;

use super::{default_project, parse_args};

fn default_note() -> MemoryType {
    MemoryType::Note
}
fn default_importance() -> f64 {
    0.5
}
fn default_confidence() -> f64 {
    0.8
}
fn default_limit() -> usize {
    10
}

pub fn schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            "memory_store",
            "Store a new memory and run proactive contradiction detection against the project's existing memories.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "content": {"type": "string"},
                    "memory_type": {"type": "string", "enum": ["fact","event","observation","preference","note","decision","procedure"]},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "importance": {"type": "number"},
                    "confidence": {"type": "number"},
                    "project_id": {"type": "string"}
                },
                "required": ["content"]
            }),
        ),
        (
            "memory_recall",
            "Fetch a memory by id, bumping its access count and strength.",
            serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}),
        ),
        (
            "memory_update",
            "Apply a partial update to a memory's content/type/tags/importance/confidence.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "content": {"type": "string"},
                    "memory_type": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "importance": {"type": "number"},
                    "confidence": {"type": "number"}
                },
                "required": ["id"]
            }),
        ),
        (
            "memory_delete",
            "Soft-delete (default) or permanently delete a memory.",
            serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}, "permanent": {"type": "boolean"}}, "required": ["id"]}),
        ),
        (
            "memory_list",
            "List a project's memories, most recently updated first.",
            serde_json::json!({"type": "object", "properties": {"project_id": {"type": "string"}, "limit": {"type": "integer"}, "include_deleted": {"type": "boolean"}}}),
        ),
        (
            "memory_search",
            "Search a project's memories in keyword, semantic, or hybrid mode.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "project_id": {"type": "string"},
                    "mode": {"type": "string", "enum": ["keyword", "semantic", "hybrid"]},
                    "limit": {"type": "integer"}
                },
                "required": ["query"]
            }),
        ),
        (
            "memory_stats",
            "Project (or global) counters: memory/entity/edge counts and average confidence.",
            serde_json::json!({"type": "object", "properties": {"project_id": {"type": "string"}}}),
        ),
        (
            "memory_suggest",
            "Rank a project's memories by keyword overlap with free-text context.",
            serde_json::json!({"type": "object", "properties": {"text": {"type": "string"}, "project_id": {"type": "string"}, "limit": {"type": "integer"}}, "required": ["text"]}),
        ),
        (
            "memory_find_contradictions",
            "Re-run contradiction detection for one memory against the rest of its project without storing anything new.",
            serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}),
        ),
    ]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoreArgs {
    content: String,
    #[serde(default = "default_note")]
    memory_type: MemoryType,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default = "default_importance")]
    importance: f64,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    project_id: Option<String>,
}

/// Detect contradictions between `content`/`embedding` and every other
/// non-deleted memory in `project_id`, recording an edge + resolution row
/// for each signal found, and bumping both sides' `contradiction_count`.
async fn detect_and_record(
    storage: &Storage,
    gateway: &ModelGateway,
    project_id: &str,
    memory_id: &str,
    content: &str,
    embedding: Option<&[f32]>,
) -> Result<Vec<Value>> {
    let mut found = Vec::new();
    let candidates = storage.list_memories(project_id, 200, false)?;

    for candidate in candidates {
        if candidate.id == memory_id {
            continue;
        }
        let similarity = match (embedding, storage.embedding_get(&candidate.id)?) {
            (Some(a), Some(b)) => Some(cosine_similarity(a, &b)),
            _ => None,
        };
        let nli = if similarity.map(|s| s >= contradiction::NLI_SIM_THRESHOLD).unwrap_or(false) {
            gateway.nli_check(content, &candidate.content).await
        } else {
            GatewayResult::NotAvailable
        };

        for signal in contradiction::detect(content, &candidate.content, similarity, nli) {
            let relation_type = contradiction_relation_type(signal.kind.as_str());
            let edge = storage.edge_create(memory_id, &candidate.id, &relation_type, signal.similarity as f64, Value::Null, project_id)?;
            storage.contradiction_record(project_id, memory_id, &candidate.id, &edge.id)?;
            storage.bump_contradiction_count(memory_id)?;
            storage.bump_contradiction_count(&candidate.id)?;
            found.push(serde_json::json!({
                "memory_id": candidate.id,
                "kind": signal.kind,
                "similarity": signal.similarity,
                "explanation": signal.explanation,
                "suggested_action": signal.suggested_action,
                "edge_id": edge.id,
            }));
        }
    }
    Ok(found)
}

pub async fn execute_store(storage: &Arc<Storage>, gateway: &ModelGateway, args: Value) -> Result<Value> {
    let args: StoreArgs = parse_args(args)?;
    let project_id = default_project(args.project_id);

    let memory = storage.store(StoreInput {
        content: args.content.clone(),
        memory_type: args.memory_type,
        tags: args.tags,
        importance: args.importance,
        confidence: args.confidence,
        project_id: project_id.clone(),
    })?;

    let embedding = gateway.embed(&memory.content).await.ready();
    if let Some(ref v) = embedding {
        storage.embedding_upsert(&memory.id, v)?;
    }

    let contradictions = detect_and_record(storage, gateway, &project_id, &memory.id, &memory.content, embedding.as_deref()).await?;

    Ok(serde_json::json!({ "memory": memory, "contradictions": contradictions }))
}

pub fn execute_recall(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        id: String,
    }
    let args: Args = parse_args(args)?;
    Ok(serde_json::to_value(storage.recall(&args.id)?)?)
}

pub async fn execute_update(storage: &Arc<Storage>, gateway: &ModelGateway, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        id: String,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        memory_type: Option<MemoryType>,
        #[serde(default)]
        tags: Option<Vec<String>>,
        #[serde(default)]
        importance: Option<f64>,
        #[serde(default)]
        confidence: Option<f64>,
    }
    let args: Args = parse_args(args)?;
    let (memory, content_changed) = storage.update(
        &args.id,
        MemoryUpdate { content: args.content, memory_type: args.memory_type, tags: args.tags, importance: args.importance, confidence: args.confidence },
    )?;

    let mut contradictions = Vec::new();
    if content_changed {
        let embedding = gateway.embed(&memory.content).await.ready();
        if let Some(ref v) = embedding {
            storage.embedding_upsert(&memory.id, v)?;
        }
        contradictions = detect_and_record(storage, gateway, &memory.project_id, &memory.id, &memory.content, embedding.as_deref()).await?;
    }

    Ok(serde_json::json!({ "memory": memory, "contradictions": contradictions }))
}

pub fn execute_delete(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        id: String,
        #[serde(default)]
        permanent: bool,
    }
    let args: Args = parse_args(args)?;
    storage.delete_memory(&args.id, args.permanent)?;
    if args.permanent {
        storage.embedding_delete(&args.id)?;
    }
    Ok(serde_json::json!({ "deleted": args.id }))
}

pub fn execute_list(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
        #[serde(default)]
        include_deleted: bool,
    }
    let args: Args = parse_args(args)?;
    let memories = storage.list_memories(&default_project(args.project_id), args.limit, args.include_deleted)?;
    Ok(serde_json::to_value(memories)?)
}

pub async fn execute_search(storage: &Arc<Storage>, gateway: &ModelGateway, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        query: String,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
    }
    let args: Args = parse_args(args)?;
    let project_id = default_project(args.project_id);
    let mode = args.mode.unwrap_or_else(|| "hybrid".to_string());

    let hits = match mode.as_str() {
        "keyword" => storage.search_keyword(&project_id, &args.query, args.limit, None)?,
        "semantic" => search_semantic(storage, gateway, &project_id, &args.query, args.limit).await?,
        "hybrid" => search_hybrid(storage, gateway, &project_id, &args.query, args.limit, 0.5, 0.5).await?,
        other => return Err(CoreError::validation(format!("unknown search mode: {other}"))),
    };
    Ok(serde_json::to_value(hits)?)
}

pub fn execute_stats(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    Ok(serde_json::to_value(storage.stats(args.project_id.as_deref())?)?)
}

pub fn execute_suggest(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        text: String,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default = "default_limit")]
        limit: usize,
    }
    let args: Args = parse_args(args)?;
    let suggestions = storage.suggest_from_context(&args.text, &default_project(args.project_id), args.limit)?;
    Ok(serde_json::to_value(suggestions)?)
}

pub async fn execute_find_contradictions(storage: &Arc<Storage>, gateway: &ModelGateway, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        id: String,
    }
    let args: Args = parse_args(args)?;
    let memory = storage.get_memory_row(&args.id)?.ok_or_else(|| CoreError::not_found(format!("memory {}", args.id)))?;
    let embedding = storage.embedding_get(&memory.id)?;
    let contradictions = detect_and_record(storage, gateway, &memory.project_id, &memory.id, &memory.content, embedding.as_deref()).await?;
    Ok(serde_json::json!({ "contradictions": contradictions }))
}

/// Used by `memory_search_contextual` in the graph tool family.
pub async fn contextual(storage: &Arc<Storage>, project_id: &str, query: &str, config: SpreadingActivationConfig) -> Result<Value> {
    let result = search_contextual(storage, project_id, query, config).await?;
    Ok(serde_json::to_value(result.activations)?)
}
