//! Tool surface: one module per family. Each tool is a pair of a JSON
//! schema (for `tools/list`) and an `execute_*` function that parses its
//! arguments with `serde_json`, calls into `just_memory_core`, and returns a
//! `serde_json::Value` result. Errors cross the boundary as
//! `{"error": <kind>, "message": <text>}`, never as a JSON-RPC fault —
//! matching the "every call returns a structured result" contract.

pub mod backup;
pub mod confidence;
pub mod contradictions;
pub mod entities;
pub mod graph;
pub mod memory;
pub mod project;
pub mod scheduled;
pub mod session;

use just_memory_core::error::CoreError;
use just_memory_core::memory::GLOBAL_PROJECT;
use serde_json::Value;

pub(crate) fn default_project(project_id: Option<String>) -> String {
    project_id.filter(|s| !s.is_empty()).unwrap_or_else(|| GLOBAL_PROJECT.to_string())
}

pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, CoreError> {
    serde_json::from_value(args).map_err(|e| CoreError::validation(format!("bad arguments: {e}")))
}

pub(crate) fn error_value(err: &CoreError) -> Value {
    serde_json::json!({ "error": err.kind(), "message": err.to_string() })
}
