//! Backup family: `memory_backup` create|restore|list.

use std::path::PathBuf;
use std::sync::Arc;

use just_memory_core::error::{CoreError, Result};
use just_memory_core::storage::{RestoreMode, Storage};
use serde::Deserialize;
use serde_json::Value;

use super::{default_project, parse_args};

pub fn schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![(
        "memory_backup",
        "Create a versioned JSON snapshot of a project, restore one, or list existing backup artifacts.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["create", "restore", "list"]},
                "project_id": {"type": "string"},
                "path": {"type": "string"},
                "mode": {"type": "string", "enum": ["merge", "replace"]}
            },
            "required": ["action"]
        }),
    )]
}

fn parse_mode(s: &str) -> Result<RestoreMode> {
    match s {
        "merge" => Ok(RestoreMode::Merge),
        "replace" => Ok(RestoreMode::Replace),
        other => Err(CoreError::validation(format!("unknown restore mode: {other}"))),
    }
}

pub fn execute_backup(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        action: String,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        mode: Option<String>,
    }
    let args: Args = parse_args(args)?;

    match args.action.as_str() {
        "create" => {
            let project_id = default_project(args.project_id);
            let path = storage.backup_snapshot(&project_id)?;
            Ok(serde_json::json!({ "path": path.display().to_string() }))
        }
        "restore" => {
            let path = args.path.ok_or_else(|| CoreError::validation("path required"))?;
            let mode = match args.mode {
                Some(ref m) => parse_mode(m)?,
                None => RestoreMode::Merge,
            };
            let counts = storage.backup_restore(&PathBuf::from(path), mode)?;
            Ok(serde_json::to_value(counts)?)
        }
        "list" => {
            let paths = storage.backup_list()?;
            let paths: Vec<String> = paths.into_iter().map(|p| p.display().to_string()).collect();
            Ok(serde_json::to_value(paths)?)
        }
        other => Err(CoreError::validation(format!("unknown backup action: {other}"))),
    }
}
