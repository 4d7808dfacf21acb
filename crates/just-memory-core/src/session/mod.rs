//! Session & Tasks (C8).
//!
//! A thin, single-writer layer on top of the scratchpad: generic
//! caller-owned key/value storage, plus a handful of reserved `_jm_`-prefixed
//! keys that only this module writes (heartbeat, last tool call, working
//! files, current task, briefing sequence). `scratch_clear` leaves every
//! `_jm_*` key untouched; `clear_session_state` does the opposite.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::storage::Storage;

const RESERVED_PREFIX: &str = "_jm_";
const HIDDEN_PREFIX: &str = "__system_";

const HEARTBEAT_KEY: &str = "_jm_last_heartbeat";
const SESSION_START_KEY: &str = "_jm_session_start";
const LAST_TOOL_KEY: &str = "_jm_last_tool";
const WORKING_FILES_KEY: &str = "_jm_working_files";
const CURRENT_TASK_KEY: &str = "_jm_current_task";
const BRIEFING_SEQ_KEY: &str = "_jm_briefing_seq";

const MAX_WORKING_FILES: usize = 20;
const STALENESS_THRESHOLD: Duration = Duration::minutes(1);
const TOOL_LOG_ARGS_TRUNCATE: usize = 2_000;

pub fn new_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HeartbeatRecord {
    session_id: String,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskStep {
    pub index: u32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub description: String,
    pub total_steps: u32,
    pub current_step: u32,
    pub journal: Vec<TaskStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrashState {
    pub crashed: bool,
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl Storage {
    // ---- generic scratchpad, caller-owned -------------------------------

    /// Write a caller-owned scratchpad entry. Rejects the `_jm_`-reserved
    /// prefix — only this module's own methods may write those keys.
    pub fn scratch_set(
        &self,
        project_id: &str,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if key.starts_with(RESERVED_PREFIX) {
            return Err(crate::error::CoreError::validation(format!(
                "key '{key}' uses the reserved '_jm_' prefix"
            )));
        }
        self.scratch_set_raw(project_id, key, value, expires_at)
    }

    pub fn scratch_get(&self, project_id: &str, key: &str) -> Result<Option<String>> {
        self.with_read(|conn| {
            conn.query_row(
                "SELECT value FROM scratchpad WHERE project_id = ?1 AND key = ?2",
                params![project_id, key],
                |r| r.get(0),
            )
            .optional()
            .map_err(crate::error::CoreError::from)
        })
    }

    pub fn scratch_delete(&self, project_id: &str, key: &str) -> Result<()> {
        self.with_write(|conn| {
            conn.execute(
                "DELETE FROM scratchpad WHERE project_id = ?1 AND key = ?2",
                params![project_id, key],
            )?;
            Ok(())
        })
    }

    /// List caller-visible entries: excludes both `_jm_*` (session-owned)
    /// and `__system_*` (hidden) keys.
    pub fn scratch_list(&self, project_id: &str) -> Result<Vec<(String, String)>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM scratchpad
                 WHERE project_id = ?1 AND key NOT LIKE '\\_jm\\_%' ESCAPE '\\' AND key NOT LIKE '\\_\\_system\\_%' ESCAPE '\\'
                 ORDER BY key",
            )?;
            let rows = stmt
                .query_map(params![project_id], |r| Ok((r.get(0)?, r.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Remove every non-`_jm_*` key for the project; `_jm_*` keys survive.
    pub fn scratch_clear(&self, project_id: &str) -> Result<()> {
        self.with_write(|conn| {
            conn.execute(
                "DELETE FROM scratchpad WHERE project_id = ?1 AND key NOT LIKE '\\_jm\\_%' ESCAPE '\\'",
                params![project_id],
            )?;
            Ok(())
        })
    }

    /// Delete expired, non-reserved scratchpad rows. Used by the Consolidator.
    pub fn clean_expired_scratchpad(&self, project_id: &str) -> Result<usize> {
        let now = Utc::now();
        self.with_write(|conn| {
            let n = conn.execute(
                "DELETE FROM scratchpad
                 WHERE project_id = ?1 AND key NOT LIKE '\\_jm\\_%' ESCAPE '\\'
                   AND expires_at IS NOT NULL AND expires_at < ?2",
                params![project_id, now.to_rfc3339()],
            )?;
            Ok(n)
        })
    }

    fn scratch_set_raw(
        &self,
        project_id: &str,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = Utc::now();
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO scratchpad (key, project_id, value, expires_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key, project_id) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at, updated_at = excluded.updated_at",
                params![key, project_id, value, expires_at.map(|d| d.to_rfc3339()), now.to_rfc3339()],
            )?;
            Ok(())
        })
    }

    fn scratch_get_raw(&self, project_id: &str, key: &str) -> Result<Option<String>> {
        self.with_read(|conn| {
            conn.query_row(
                "SELECT value FROM scratchpad WHERE project_id = ?1 AND key = ?2",
                params![project_id, key],
                |r| r.get(0),
            )
            .optional()
            .map_err(crate::error::CoreError::from)
        })
    }

    // ---- session lifecycle -----------------------------------------------

    pub fn heartbeat(&self, project_id: &str, session_id: &str) -> Result<()> {
        let record = HeartbeatRecord { session_id: session_id.to_string(), timestamp: Utc::now() };
        let json = serde_json::to_string(&record)?;
        self.scratch_set_raw(project_id, HEARTBEAT_KEY, &json, None)
    }

    pub fn mark_session_start(&self, project_id: &str, session_id: &str) -> Result<()> {
        let record = HeartbeatRecord { session_id: session_id.to_string(), timestamp: Utc::now() };
        let json = serde_json::to_string(&record)?;
        self.scratch_set_raw(project_id, SESSION_START_KEY, &json, None)
    }

    /// Record the most recent tool call; append `file_path`/`path` arguments
    /// to the deduped, capped `_jm_working_files` list, and append an
    /// observational row to the tool-call log (a bounded, append-only
    /// log" — purely observational, purged by the Consolidator).
    pub fn record_tool_call(&self, project_id: &str, tool: &str, args: &serde_json::Value, success: bool) -> Result<()> {
        self.scratch_set_raw(project_id, LAST_TOOL_KEY, tool, None)?;
        self.log_tool_call(project_id, tool, args, success)?;

        let path = args
            .get("file_path")
            .or_else(|| args.get("path"))
            .and_then(|v| v.as_str());
        let Some(path) = path else { return Ok(()) };

        let existing = self.scratch_get_raw(project_id, WORKING_FILES_KEY)?;
        let mut files: Vec<String> = existing
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        files.retain(|f| f != path);
        files.push(path.to_string());
        if files.len() > MAX_WORKING_FILES {
            let overflow = files.len() - MAX_WORKING_FILES;
            files.drain(0..overflow);
        }
        let json = serde_json::to_string(&files)?;
        self.scratch_set_raw(project_id, WORKING_FILES_KEY, &json, None)
    }

    fn log_tool_call(&self, project_id: &str, tool: &str, args: &serde_json::Value, success: bool) -> Result<()> {
        let mut arguments = args.to_string();
        if arguments.len() > TOOL_LOG_ARGS_TRUNCATE {
            arguments.truncate(TOOL_LOG_ARGS_TRUNCATE);
        }
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO tool_call_log (id, project_id, timestamp, tool_name, arguments, success)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, project_id, now.to_rfc3339(), tool, arguments, success],
            )?;
            Ok(())
        })
    }

    pub fn working_files(&self, project_id: &str) -> Result<Vec<String>> {
        Ok(self
            .scratch_get_raw(project_id, WORKING_FILES_KEY)?
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default())
    }

    // ---- current task ------------------------------------------------------

    pub fn task_set(&self, project_id: &str, description: &str, total_steps: u32) -> Result<TaskState> {
        let now = Utc::now();
        let state = TaskState {
            description: description.to_string(),
            total_steps,
            current_step: 0,
            journal: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&state)?;
        self.scratch_set_raw(project_id, CURRENT_TASK_KEY, &json, None)?;
        Ok(state)
    }

    pub fn task_update(&self, project_id: &str, step_index: u32, step_description: &str) -> Result<TaskState> {
        let mut state = self
            .task_get(project_id)?
            .ok_or_else(|| crate::error::CoreError::not_found("no current task"))?;
        state.current_step = step_index;
        state.journal.push(TaskStep { index: step_index, description: step_description.to_string() });
        state.updated_at = Utc::now();
        let json = serde_json::to_string(&state)?;
        self.scratch_set_raw(project_id, CURRENT_TASK_KEY, &json, None)?;
        Ok(state)
    }

    pub fn task_get(&self, project_id: &str) -> Result<Option<TaskState>> {
        Ok(self
            .scratch_get_raw(project_id, CURRENT_TASK_KEY)?
            .and_then(|s| serde_json::from_str(&s).ok()))
    }

    pub fn task_clear(&self, project_id: &str) -> Result<()> {
        self.scratch_delete(project_id, CURRENT_TASK_KEY)
    }

    // ---- briefing sequence & full reset ------------------------------------

    pub fn briefing_seq_increment(&self, project_id: &str) -> Result<u64> {
        let current: u64 = self
            .scratch_get_raw(project_id, BRIEFING_SEQ_KEY)?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let next = current + 1;
        self.scratch_set_raw(project_id, BRIEFING_SEQ_KEY, &next.to_string(), None)?;
        Ok(next)
    }

    pub fn clear_session_state(&self, project_id: &str) -> Result<()> {
        self.with_write(|conn| {
            conn.execute(
                "DELETE FROM scratchpad WHERE project_id = ?1 AND key LIKE '\\_jm\\_%' ESCAPE '\\'",
                params![project_id],
            )?;
            Ok(())
        })
    }

    /// Crash detection: a heartbeat from a *different* session id, older
    /// than the staleness threshold, means the process that wrote it never
    /// shut down cleanly. Corrupt JSON is treated as "no crash" rather than
    /// propagated as an error.
    pub fn check_crash(&self, project_id: &str, current_session_id: &str) -> Result<CrashState> {
        let raw = self.scratch_get_raw(project_id, HEARTBEAT_KEY)?;
        let Some(raw) = raw else {
            return Ok(CrashState { crashed: false, last_heartbeat: None });
        };
        let Ok(record) = serde_json::from_str::<HeartbeatRecord>(&raw) else {
            return Ok(CrashState { crashed: false, last_heartbeat: None });
        };
        let stale = Utc::now() - record.timestamp >= STALENESS_THRESHOLD;
        let crashed = record.session_id != current_session_id && stale;
        Ok(CrashState { crashed, last_heartbeat: Some(record.timestamp) })
    }

    // ---- project-scoped config (hidden scratchpad namespace) --------------

    /// Named config value for a project, stored under the `__system_`
    /// hidden prefix so it never surfaces through `scratch_list`.
    pub fn project_config_set(&self, project_id: &str, key: &str, value: &str) -> Result<()> {
        self.scratch_set_raw(project_id, &project_config_key(key), value, None)
    }

    pub fn project_config_get(&self, project_id: &str, key: &str) -> Result<Option<String>> {
        self.scratch_get_raw(project_id, &project_config_key(key))
    }

    /// All config entries for a project, stripped of the hidden-prefix
    /// bookkeeping the keys carry internally.
    pub fn project_config_list(&self, project_id: &str) -> Result<Vec<(String, String)>> {
        let prefix = project_config_key("");
        self.with_read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM scratchpad WHERE project_id = ?1 AND key LIKE ?2 ORDER BY key",
            )?;
            let pattern = format!("{prefix}%");
            let rows = stmt
                .query_map(params![project_id, pattern], |r| Ok((r.get::<_, String>(0)?, r.get(1)?)))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows
                .into_iter()
                .map(|(k, v)| (k.trim_start_matches(&prefix).to_string(), v))
                .collect())
        })
    }
}

fn project_config_key(key: &str) -> String {
    format!("{HIDDEN_PREFIX}project_config:{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_set_rejects_reserved_prefix() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(storage.scratch_set("p1", "_jm_sneaky", "x", None).is_err());
    }

    #[test]
    fn scratch_clear_preserves_session_keys() {
        let storage = Storage::open_in_memory().unwrap();
        storage.scratch_set("p1", "note", "hello", None).unwrap();
        storage.heartbeat("p1", "s1").unwrap();
        storage.scratch_clear("p1").unwrap();
        assert!(storage.scratch_get("p1", "note").unwrap().is_none());
        assert!(storage.check_crash("p1", "s1").unwrap().last_heartbeat.is_some());
    }

    #[test]
    fn scratch_list_hides_reserved_and_system_keys() {
        let storage = Storage::open_in_memory().unwrap();
        storage.scratch_set("p1", "visible", "v", None).unwrap();
        storage.heartbeat("p1", "s1").unwrap();
        storage.scratch_set_raw("p1", "__system_hidden", "v", None).unwrap();
        let listed = storage.scratch_list("p1").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, "visible");
    }

    #[test]
    fn working_files_dedupe_and_cap() {
        let storage = Storage::open_in_memory().unwrap();
        for i in 0..25 {
            let args = serde_json::json!({ "file_path": format!("/f{i}.rs") });
            storage.record_tool_call("p1", "edit", &args, true).unwrap();
        }
        let args = serde_json::json!({ "file_path": "/f0.rs" });
        storage.record_tool_call("p1", "edit", &args, true).unwrap();
        let files = storage.working_files("p1").unwrap();
        assert!(files.len() <= MAX_WORKING_FILES);
        assert_eq!(files.last().unwrap(), "/f0.rs");
    }

    #[test]
    fn task_lifecycle_tracks_journal() {
        let storage = Storage::open_in_memory().unwrap();
        storage.task_set("p1", "migrate schema", 3).unwrap();
        storage.task_update("p1", 1, "applied migration 1").unwrap();
        let state = storage.task_get("p1").unwrap().unwrap();
        assert_eq!(state.current_step, 1);
        assert_eq!(state.journal.len(), 1);
        storage.task_clear("p1").unwrap();
        assert!(storage.task_get("p1").unwrap().is_none());
    }

    #[test]
    fn crash_detected_for_stale_foreign_session() {
        let storage = Storage::open_in_memory().unwrap();
        let old = HeartbeatRecord { session_id: "OLD".into(), timestamp: Utc::now() - Duration::minutes(5) };
        let json = serde_json::to_string(&old).unwrap();
        storage.scratch_set_raw("p1", HEARTBEAT_KEY, &json, None).unwrap();

        let state = storage.check_crash("p1", "NEW").unwrap();
        assert!(state.crashed);
        assert_eq!(state.last_heartbeat.unwrap(), old.timestamp);
    }

    #[test]
    fn no_crash_for_same_session() {
        let storage = Storage::open_in_memory().unwrap();
        storage.heartbeat("p1", "s1").unwrap();
        let state = storage.check_crash("p1", "s1").unwrap();
        assert!(!state.crashed);
    }

    #[test]
    fn corrupt_heartbeat_json_is_not_a_crash() {
        let storage = Storage::open_in_memory().unwrap();
        storage.scratch_set_raw("p1", HEARTBEAT_KEY, "not json", None).unwrap();
        let state = storage.check_crash("p1", "s1").unwrap();
        assert!(!state.crashed);
    }

    #[test]
    fn briefing_seq_is_monotonic() {
        let storage = Storage::open_in_memory().unwrap();
        assert_eq!(storage.briefing_seq_increment("p1").unwrap(), 1);
        assert_eq!(storage.briefing_seq_increment("p1").unwrap(), 2);
    }

    #[test]
    fn project_config_is_hidden_from_scratch_list() {
        let storage = Storage::open_in_memory().unwrap();
        storage.project_config_set("p1", "embedding_size", "large").unwrap();
        storage.scratch_set("p1", "visible", "v", None).unwrap();

        assert_eq!(storage.project_config_get("p1", "embedding_size").unwrap().as_deref(), Some("large"));
        assert_eq!(storage.scratch_list("p1").unwrap(), vec![("visible".to_string(), "v".to_string())]);

        let listed = storage.project_config_list("p1").unwrap();
        assert_eq!(listed, vec![("embedding_size".to_string(), "large".to_string())]);
    }
}
