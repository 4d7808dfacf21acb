//! Session family: `memory_briefing`, `memory_task`, `memory_scratch`,
//! `memory_heartbeat`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use just_memory_core::error::{CoreError, Result};
use just_memory_core::storage::Storage;
use serde::Deserialize;
use serde_json::Value;

use super::{default_project, parse_args};

pub fn schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            "memory_briefing",
            "Session-start briefing: recent memories, open task, crash detection, and a briefing sequence number.",
            serde_json::json!({"type": "object", "properties": {"project_id": {"type": "string"}, "session_id": {"type": "string"}}, "required": ["session_id"]}),
        ),
        (
            "memory_task",
            "Set, update, get, or clear the project's single in-flight task.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["set", "update", "get", "clear"]},
                    "project_id": {"type": "string"},
                    "description": {"type": "string"},
                    "total_steps": {"type": "integer"},
                    "step_index": {"type": "integer"},
                    "step_description": {"type": "string"}
                },
                "required": ["action"]
            }),
        ),
        (
            "memory_scratch",
            "Set, get, delete, list, or clear caller-owned scratchpad entries.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "action": {"type": "string", "enum": ["set", "get", "delete", "list", "clear"]},
                    "project_id": {"type": "string"},
                    "key": {"type": "string"},
                    "value": {"type": "string"},
                    "expires_at": {"type": "string"}
                },
                "required": ["action"]
            }),
        ),
        (
            "memory_heartbeat",
            "Record a liveness heartbeat for the current session.",
            serde_json::json!({"type": "object", "properties": {"project_id": {"type": "string"}, "session_id": {"type": "string"}}, "required": ["session_id"]}),
        ),
    ]
}

pub fn execute_briefing(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        #[serde(default)]
        project_id: Option<String>,
        session_id: String,
    }
    let args: Args = parse_args(args)?;
    Ok(serde_json::to_value(storage.briefing(&default_project(args.project_id), &args.session_id)?)?)
}

pub fn execute_heartbeat(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        #[serde(default)]
        project_id: Option<String>,
        session_id: String,
    }
    let args: Args = parse_args(args)?;
    let project_id = default_project(args.project_id);
    storage.heartbeat(&project_id, &args.session_id)?;
    Ok(serde_json::json!({ "ok": true }))
}

pub fn execute_task(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        action: String,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        total_steps: Option<u32>,
        #[serde(default)]
        step_index: Option<u32>,
        #[serde(default)]
        step_description: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let project_id = default_project(args.project_id);

    match args.action.as_str() {
        "set" => {
            let description = args.description.ok_or_else(|| CoreError::validation("description required"))?;
            let total_steps = args.total_steps.ok_or_else(|| CoreError::validation("total_steps required"))?;
            Ok(serde_json::to_value(storage.task_set(&project_id, &description, total_steps)?)?)
        }
        "update" => {
            let step_index = args.step_index.ok_or_else(|| CoreError::validation("step_index required"))?;
            let step_description = args.step_description.ok_or_else(|| CoreError::validation("step_description required"))?;
            Ok(serde_json::to_value(storage.task_update(&project_id, step_index, &step_description)?)?)
        }
        "get" => Ok(serde_json::to_value(storage.task_get(&project_id)?)?),
        "clear" => {
            storage.task_clear(&project_id)?;
            Ok(serde_json::json!({ "cleared": true }))
        }
        other => Err(CoreError::validation(format!("unknown task action: {other}"))),
    }
}

pub fn execute_scratch(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        action: String,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        value: Option<String>,
        #[serde(default)]
        expires_at: Option<DateTime<Utc>>,
    }
    let args: Args = parse_args(args)?;
    let project_id = default_project(args.project_id);

    match args.action.as_str() {
        "set" => {
            let key = args.key.ok_or_else(|| CoreError::validation("key required"))?;
            let value = args.value.ok_or_else(|| CoreError::validation("value required"))?;
            storage.scratch_set(&project_id, &key, &value, args.expires_at)?;
            Ok(serde_json::json!({ "ok": true }))
        }
        "get" => {
            let key = args.key.ok_or_else(|| CoreError::validation("key required"))?;
            Ok(serde_json::to_value(storage.scratch_get(&project_id, &key)?)?)
        }
        "delete" => {
            let key = args.key.ok_or_else(|| CoreError::validation("key required"))?;
            storage.scratch_delete(&project_id, &key)?;
            Ok(serde_json::json!({ "deleted": key }))
        }
        "list" => {
            let entries = storage.scratch_list(&project_id)?;
            Ok(serde_json::to_value(entries)?)
        }
        "clear" => {
            storage.scratch_clear(&project_id)?;
            Ok(serde_json::json!({ "cleared": true }))
        }
        other => Err(CoreError::validation(format!("unknown scratch action: {other}"))),
    }
}
