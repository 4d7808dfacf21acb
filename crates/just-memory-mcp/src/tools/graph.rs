//! Graph family: `memory_edge_create`, `memory_edge_query`,
//! `memory_edge_invalidate`, `memory_graph_traverse`, `memory_search_contextual`.

use std::sync::Arc;

use just_memory_core::error::{CoreError, Result};
use just_memory_core::graph::Direction;
use just_memory_core::search::{search_contextual, spreading_activation, SpreadingActivationConfig};
use just_memory_core::storage::Storage;
use serde::Deserialize;
use serde_json::Value;

use super::{default_project, parse_args};

pub fn schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            "memory_edge_create",
            "Create a bi-temporal edge between two memories.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "from_id": {"type": "string"},
                    "to_id": {"type": "string"},
                    "relation_type": {"type": "string"},
                    "confidence": {"type": "number"},
                    "metadata": {"type": "object"},
                    "project_id": {"type": "string"}
                },
                "required": ["from_id", "to_id", "relation_type"]
            }),
        ),
        (
            "memory_edge_query",
            "List edges incident to a memory, optionally filtered by direction.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "memory_id": {"type": "string"},
                    "direction": {"type": "string", "enum": ["in", "out", "both"]},
                    "project_id": {"type": "string"},
                    "include_invalidated": {"type": "boolean"}
                },
                "required": ["memory_id"]
            }),
        ),
        (
            "memory_edge_invalidate",
            "Mark an edge invalid as of now (monotonic, idempotent on already-invalid edges).",
            serde_json::json!({"type": "object", "properties": {"edge_id": {"type": "string"}}, "required": ["edge_id"]}),
        ),
        (
            "memory_graph_traverse",
            "Spreading activation over the edge graph, starting from seed memory ids.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "seeds": {"type": "array", "items": {"type": "string"}},
                    "project_id": {"type": "string"},
                    "max_hops": {"type": "integer"},
                    "decay": {"type": "number"}
                },
                "required": ["seeds"]
            }),
        ),
        (
            "memory_search_contextual",
            "Keyword-seeded spreading activation: rank memories by graph proximity to a query's keyword hits.",
            serde_json::json!({"type": "object", "properties": {"query": {"type": "string"}, "project_id": {"type": "string"}}, "required": ["query"]}),
        ),
    ]
}

fn parse_direction(s: &str) -> Result<Direction> {
    match s {
        "in" => Ok(Direction::In),
        "out" => Ok(Direction::Out),
        "both" => Ok(Direction::Both),
        other => Err(CoreError::validation(format!("unknown direction: {other}"))),
    }
}

pub fn execute_edge_create(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        from_id: String,
        to_id: String,
        relation_type: String,
        #[serde(default = "default_confidence")]
        confidence: f64,
        #[serde(default)]
        metadata: Value,
        #[serde(default)]
        project_id: Option<String>,
    }
    fn default_confidence() -> f64 {
        1.0
    }
    let args: Args = parse_args(args)?;
    let edge = storage.edge_create(&args.from_id, &args.to_id, &args.relation_type, args.confidence, args.metadata, &default_project(args.project_id))?;
    Ok(serde_json::to_value(edge)?)
}

pub fn execute_edge_query(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        memory_id: String,
        #[serde(default)]
        direction: Option<String>,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        include_invalidated: bool,
    }
    let args: Args = parse_args(args)?;
    let direction = match args.direction {
        Some(ref d) => parse_direction(d)?,
        None => Direction::Both,
    };
    let edges = storage.edge_query(&args.memory_id, direction, &default_project(args.project_id), args.include_invalidated)?;
    Ok(serde_json::to_value(edges)?)
}

pub fn execute_edge_invalidate(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        edge_id: String,
    }
    let args: Args = parse_args(args)?;
    Ok(serde_json::to_value(storage.edge_invalidate(&args.edge_id)?)?)
}

pub fn execute_graph_traverse(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        seeds: Vec<String>,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        max_hops: Option<u32>,
        #[serde(default)]
        decay: Option<f64>,
    }
    let args: Args = parse_args(args)?;
    let mut config = SpreadingActivationConfig::default();
    if let Some(max_hops) = args.max_hops {
        config.max_hops = max_hops;
    }
    if let Some(decay) = args.decay {
        config.decay = decay;
    }
    let result = spreading_activation(storage, &default_project(args.project_id), &args.seeds, config)?;
    Ok(serde_json::json!({ "activations": result.activations }))
}

pub async fn execute_search_contextual(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        query: String,
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let result = search_contextual(storage, &default_project(args.project_id), &args.query, SpreadingActivationConfig::default()).await?;
    Ok(serde_json::json!({ "activations": result.activations }))
}
