//! Contradictions family: `memory_contradictions_scan|pending|resolve|recalibrate`.

use std::sync::Arc;

use just_memory_core::contradiction::ResolutionKind;
use just_memory_core::error::{CoreError, Result};
use just_memory_core::storage::Storage;
use serde::Deserialize;
use serde_json::Value;

use super::{default_project, parse_args};

pub fn schemas() -> Vec<(&'static str, &'static str, Value)> {
    vec![
        (
            "memory_contradictions_scan",
            "List pending contradictions for a project, optionally auto-resolving version-update/temporal-supersession false positives first.",
            serde_json::json!({"type": "object", "properties": {"project_id": {"type": "string"}, "auto": {"type": "boolean"}}}),
        ),
        (
            "memory_contradictions_pending",
            "List pending (unresolved) contradictions for a project.",
            serde_json::json!({"type": "object", "properties": {"project_id": {"type": "string"}}}),
        ),
        (
            "memory_contradictions_resolve",
            "Resolve a pending contradiction: keep one side, keep both, merge, or delete both.",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "id": {"type": "string"},
                    "kind": {"type": "string", "enum": ["keep_first", "keep_second", "keep_both", "merge", "delete_both"]},
                    "note": {"type": "string"},
                    "merged_content": {"type": "string"}
                },
                "required": ["id", "kind"]
            }),
        ),
        (
            "memory_contradictions_recalibrate",
            "Recompute every memory's contradiction_count from its live contradiction edges.",
            serde_json::json!({"type": "object", "properties": {"project_id": {"type": "string"}}}),
        ),
    ]
}

fn parse_kind(s: &str) -> Result<ResolutionKind> {
    match s {
        "keep_first" => Ok(ResolutionKind::KeepFirst),
        "keep_second" => Ok(ResolutionKind::KeepSecond),
        "keep_both" => Ok(ResolutionKind::KeepBoth),
        "merge" => Ok(ResolutionKind::Merge),
        "delete_both" => Ok(ResolutionKind::DeleteBoth),
        other => Err(CoreError::validation(format!("unknown resolution kind: {other}"))),
    }
}

pub fn execute_scan(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        #[serde(default)]
        project_id: Option<String>,
        #[serde(default)]
        auto: bool,
    }
    let args: Args = parse_args(args)?;
    let project_id = default_project(args.project_id);

    let auto_resolved = if args.auto { storage.contradiction_auto_resolve(&project_id)? } else { Vec::new() };
    let pending = storage.contradiction_scan(&project_id)?;
    Ok(serde_json::json!({ "pending": pending, "auto_resolved": auto_resolved }))
}

pub fn execute_pending(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    Ok(serde_json::to_value(storage.contradiction_scan(&default_project(args.project_id))?)?)
}

pub fn execute_resolve(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        id: String,
        kind: String,
        #[serde(default)]
        note: Option<String>,
        #[serde(default)]
        merged_content: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let kind = parse_kind(&args.kind)?;
    Ok(serde_json::to_value(storage.contradiction_resolve(&args.id, kind, args.note, args.merged_content)?)?)
}

pub fn execute_recalibrate(storage: &Arc<Storage>, args: Value) -> Result<Value> {
    #[derive(Deserialize)]
    #[serde(deny_unknown_fields)]
    struct Args {
        #[serde(default)]
        project_id: Option<String>,
    }
    let args: Args = parse_args(args)?;
    let touched = storage.recalibrate_contradiction_counts(&default_project(args.project_id))?;
    Ok(serde_json::json!({ "touched": touched }))
}
