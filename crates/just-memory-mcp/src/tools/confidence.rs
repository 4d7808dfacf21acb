//! Confidence family: `memory_confirm`, `memory_contradict`.

use std::sync::Arc;

use just_memory_core::error::Result;
use just_memory_core::storage::Storage;
use serde::Deserialize;
use serde_json::Value;

use super::parse_args;

pub fn schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            "memory_confirm",
            "Boost a memory's confidence after it has been independently confirmed.",
            serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}),
        ),
        (
            "memory_contradict",
            "Penalize a memory's confidence after it was contradicted.",
            serde_json::json!({"type": "object", "properties": {"id": {"type": "string"}}, "required": ["id"]}),
        ),
    ]
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    id: String,
}

pub fn execute_confirm(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    let args: Args = parse_args(args)?;
    Ok(serde_json::to_value(storage.confirm(&args.id)?)?)
}

pub fn execute_contradict(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    let args: Args = parse_args(args)?;
    Ok(serde_json::to_value(storage.contradict(&args.id)?)?)
}
