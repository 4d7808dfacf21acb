//! Config family: `memory_project` get|set|list.

use std::sync::Arc;

use just_memory_core::error::{CoreError, Result};
use just_memory_core::storage::Storage;
use serde::Deserialize;
use serde_json::Value;

use super::{default_project, parse_args};

pub fn schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![(
        "memory_project",
        "Get or set a named project-scoped config value, or list every project with at least one stored row.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["get", "set", "list"]},
                "project_id": {"type": "string"},
                "key": {"type": "string"},
                "value": {"type": "string"}
            },
            "required": ["action"]
        }),
    )]
}

pub fn execute_project(storage: &Arc<Storage>, args: Value) -> Result<Value> {
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
    }
    let args: Args = parse_args(args)?;

    match args.action.as_str() {
        "get" => {
            let project_id = default_project(args.project_id);
            match args.key {
                Some(key) => {
                    let value = storage.project_config_get(&project_id, &key)?;
                    Ok(serde_json::json!({ "project_id": project_id, "key": key, "value": value }))
                }
                None => {
                    let entries = storage.project_config_list(&project_id)?;
                    Ok(serde_json::json!({ "project_id": project_id, "config": entries }))
                }
            }
        }
        "set" => {
            let project_id = default_project(args.project_id);
            let key = args.key.ok_or_else(|| CoreError::validation("key required"))?;
            let value = args.value.ok_or_else(|| CoreError::validation("value required"))?;
            storage.project_config_set(&project_id, &key, &value)?;
            Ok(serde_json::json!({ "ok": true }))
        }
        "list" => Ok(serde_json::to_value(storage.list_projects()?)?),
        other => Err(CoreError::validation(format!("unknown project action: {other}"))),
    }
}
