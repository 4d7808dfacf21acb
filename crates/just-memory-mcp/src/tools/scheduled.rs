//! Scheduled family: `memory_scheduled` schedule|list|check|complete|cancel.

use std::sync::Arc;

use just_memory_core::error::{CoreError, Result};
use just_memory_core::storage::Storage;
use serde::Deserialize;
use serde_json::Value;

use super::{default_project, parse_args};

pub fn schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![(
        "memory_scheduled",
        "Schedule, list, check due, complete, or cancel a one-off or recurring (cron) scheduled task.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["schedule", "list", "check", "complete", "cancel"]},
                "project_id": {"type": "string"},
                "id": {"type": "string"},
                "title": {"type": "string"},
                "description": {"type": "string"},
                "schedule": {"type": "string"},
                "recurring": {"type": "boolean"},
                "action_type": {"type": "string"},
                "action_data": {"type": "object"}
            },
            "required": ["action"]
        }),
    )]
}

pub fn execute_scheduled(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        action: String,
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        title: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        schedule: Option<String>,
        #[serde(default)]
        recurring: bool,
        #[serde(default)]
        action_type: Option<String>,
        #[serde(default)]
        action_data: Value,
    }
    let args: Args = parse_args(args)?;
    let project_id = default_project(args.project_id);

    match args.action.as_str() {
        "schedule" => {
            let title = args.title.ok_or_else(|| CoreError::validation("title required"))?;
            let schedule = args.schedule.ok_or_else(|| CoreError::validation("schedule required"))?;
            let task = storage.scheduled_task_create(
                &project_id,
                &title,
                args.description.as_deref().unwrap_or(""),
                &schedule,
                args.recurring,
                args.action_type.as_deref().unwrap_or("reminder"),
                args.action_data,
            )?;
            Ok(serde_json::to_value(task)?)
        }
        "list" => Ok(serde_json::to_value(storage.scheduled_task_list(&project_id)?)?),
        "check" => Ok(serde_json::to_value(storage.check_due(&project_id)?)?),
        "complete" => {
            let id = args.id.ok_or_else(|| CoreError::validation("id required"))?;
            Ok(serde_json::to_value(storage.scheduled_task_complete(&id)?)?)
        }
        "cancel" => {
            let id = args.id.ok_or_else(|| CoreError::validation("id required"))?;
            Ok(serde_json::to_value(storage.scheduled_task_cancel(&id)?)?)
        }
        other => Err(CoreError::validation(format!("unknown scheduled action: {other}"))),
    }
}
