//! Memory Resources
//!
//! `memory://` URI scheme resources for the MCP server. These are read-only
//! views over a project's state, meant for a client to pull into context
//! without going through a tool call.

use std::sync::Arc;

use just_memory_core::memory::GLOBAL_PROJECT;
use just_memory_core::storage::Storage;

/// Read a `memory://` resource.
pub fn read(storage: &Arc<Storage>, uri: &str) -> Result<String, String> {
    let path = uri.strip_prefix("memory://").unwrap_or("");

    let (path, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };
    let project_id = parse_query_param(query, "project").unwrap_or_else(|| GLOBAL_PROJECT.to_string());

    match path {
        "stats" => read_stats(storage, &project_id),
        "recent" => {
            let n: usize = parse_query_param(query, "n").and_then(|s| s.parse().ok()).unwrap_or(10);
            read_recent(storage, &project_id, n.clamp(1, 100))
        }
        "contradictions/pending" => read_pending_contradictions(storage, &project_id),
        _ => Err(format!("unknown memory resource: {path}")),
    }
}

fn parse_query_param(query: Option<&str>, key: &str) -> Option<String> {
    query.and_then(|q| {
        q.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            if k == key { Some(v.to_string()) } else { None }
        })
    })
}

fn read_stats(storage: &Arc<Storage>, project_id: &str) -> Result<String, String> {
    let stats = storage.stats(Some(project_id)).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&stats).map_err(|e| e.to_string())
}

fn read_recent(storage: &Arc<Storage>, project_id: &str, limit: usize) -> Result<String, String> {
    let memories = storage.list_memories(project_id, limit, false).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&memories).map_err(|e| e.to_string())
}

fn read_pending_contradictions(storage: &Arc<Storage>, project_id: &str) -> Result<String, String> {
    let pending = storage.contradiction_scan(project_id).map_err(|e| e.to_string())?;
    serde_json::to_string_pretty(&pending).map_err(|e| e.to_string())
}
