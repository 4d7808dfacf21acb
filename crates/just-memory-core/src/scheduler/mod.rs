//! Scheduler (C10).
//!
//! Accepts a raw schedule string that is either a 5-field POSIX cron
//! expression or one of a handful of natural-language phrases, resolves it
//! to a concrete `next_run` instant, and persists the task. `check_due`
//! triggers pending tasks whose `next_run` has passed; recurring tasks
//! immediately compute their following occurrence and stay `pending`.

mod cron;
mod natural;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::storage::Storage;

pub use cron::next_cron_occurrence;
pub use natural::parse_natural_language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Triggered,
    Completed,
    Cancelled,
}

impl TaskStatus {
    fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Triggered => "triggered",
            TaskStatus::Completed => "completed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "triggered" => TaskStatus::Triggered,
            "completed" => TaskStatus::Completed,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScheduledTask {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub description: String,
    pub schedule: String,
    pub cron_expression: Option<String>,
    pub next_run: chrono::DateTime<Utc>,
    pub status: TaskStatus,
    pub recurring: bool,
    pub action_type: String,
    pub action_data: serde_json::Value,
    pub created_at: chrono::DateTime<Utc>,
}

const SELECT_COLUMNS: &str =
    "id, project_id, title, description, schedule, cron_expression, next_run, status, recurring, action_type, action_data, created_at";

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<ScheduledTask> {
    let status_str: String = row.get("status")?;
    let action_data: String = row.get("action_data")?;
    Ok(ScheduledTask {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        schedule: row.get("schedule")?,
        cron_expression: row.get("cron_expression")?,
        next_run: row.get("next_run")?,
        status: TaskStatus::parse(&status_str),
        recurring: row.get::<_, i64>("recurring")? != 0,
        action_type: row.get("action_type")?,
        action_data: serde_json::from_str(&action_data).unwrap_or(serde_json::Value::Null),
        created_at: row.get("created_at")?,
    })
}

/// Resolve a raw schedule string (cron or natural-language) to its next
/// occurrence and, if it parsed as cron, the canonical cron expression.
fn resolve_schedule(schedule: &str, now: chrono::DateTime<Utc>) -> Result<(chrono::DateTime<Utc>, Option<String>)> {
    if cron::looks_like_cron(schedule) {
        let next = cron::next_cron_occurrence(schedule, now)?;
        return Ok((next, Some(schedule.to_string())));
    }
    if let Some(next) = natural::parse_natural_language(schedule, now) {
        return Ok((next, None));
    }
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(schedule) {
        return Ok((parsed.with_timezone(&Utc), None));
    }
    Err(CoreError::validation(format!("unrecognized schedule: {schedule}")))
}

impl Storage {
    pub fn scheduled_task_create(
        &self,
        project_id: &str,
        title: &str,
        description: &str,
        schedule: &str,
        recurring: bool,
        action_type: &str,
        action_data: serde_json::Value,
    ) -> Result<ScheduledTask> {
        let now = Utc::now();
        let (next_run, cron_expression) = resolve_schedule(schedule, now)?;
        let id = Uuid::new_v4().simple().to_string();
        let action_json = serde_json::to_string(&action_data)?;

        self.with_write(|conn| {
            conn.execute(
                "INSERT INTO scheduled_tasks
                     (id, project_id, title, description, schedule, cron_expression, next_run, status, recurring, action_type, action_data, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,'pending',?8,?9,?10,?11)",
                params![
                    id,
                    project_id,
                    title,
                    description,
                    schedule,
                    cron_expression,
                    next_run.to_rfc3339(),
                    recurring as i64,
                    action_type,
                    action_json,
                    now.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;

        Ok(ScheduledTask {
            id,
            project_id: project_id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            schedule: schedule.to_string(),
            cron_expression,
            next_run,
            status: TaskStatus::Pending,
            recurring,
            action_type: action_type.to_string(),
            action_data,
            created_at: now,
        })
    }

    pub fn scheduled_task_get(&self, id: &str) -> Result<Option<ScheduledTask>> {
        self.with_read(|conn| {
            conn.query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM scheduled_tasks WHERE id = ?1"),
                params![id],
                row_to_task,
            )
            .optional()
            .map_err(CoreError::from)
        })
    }

    pub fn scheduled_task_list(&self, project_id: &str) -> Result<Vec<ScheduledTask>> {
        self.with_read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM scheduled_tasks WHERE project_id = ?1 ORDER BY next_run ASC"
            ))?;
            let rows = stmt
                .query_map(params![project_id], row_to_task)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Trigger every `pending` task whose `next_run` has passed. Recurring
    /// tasks compute their next cron occurrence and remain `pending`;
    /// one-shot tasks transition to `triggered`.
    pub fn check_due(&self, project_id: &str) -> Result<Vec<ScheduledTask>> {
        let now = Utc::now();
        let due = self.with_read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM scheduled_tasks
                 WHERE project_id = ?1 AND status = 'pending' AND next_run <= ?2"
            ))?;
            let rows = stmt
                .query_map(params![project_id, now.to_rfc3339()], row_to_task)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        let mut triggered = Vec::with_capacity(due.len());
        for mut task in due {
            if task.recurring {
                let Some(ref cron_expr) = task.cron_expression else {
                    continue;
                };
                let next = cron::next_cron_occurrence(cron_expr, now)?;
                self.with_write(|conn| {
                    conn.execute(
                        "UPDATE scheduled_tasks SET next_run = ?1 WHERE id = ?2",
                        params![next.to_rfc3339(), task.id],
                    )?;
                    Ok(())
                })?;
                task.next_run = next;
            } else {
                self.with_write(|conn| {
                    conn.execute(
                        "UPDATE scheduled_tasks SET status = 'triggered' WHERE id = ?1",
                        params![task.id],
                    )?;
                    Ok(())
                })?;
                task.status = TaskStatus::Triggered;
            }
            triggered.push(task);
        }
        Ok(triggered)
    }

    pub fn scheduled_task_complete(&self, id: &str) -> Result<ScheduledTask> {
        let task = self
            .scheduled_task_get(id)?
            .ok_or_else(|| CoreError::not_found(format!("scheduled task {id} not found")))?;
        if task.status != TaskStatus::Triggered {
            return Err(CoreError::InvariantViolation(format!(
                "cannot complete task {id} from status {:?}",
                task.status
            )));
        }
        self.with_write(|conn| {
            conn.execute("UPDATE scheduled_tasks SET status = 'completed' WHERE id = ?1", params![id])?;
            Ok(())
        })?;
        Ok(ScheduledTask { status: TaskStatus::Completed, ..task })
    }

    pub fn scheduled_task_cancel(&self, id: &str) -> Result<ScheduledTask> {
        let task = self
            .scheduled_task_get(id)?
            .ok_or_else(|| CoreError::not_found(format!("scheduled task {id} not found")))?;
        if matches!(task.status, TaskStatus::Completed | TaskStatus::Cancelled) {
            return Err(CoreError::InvariantViolation(format!(
                "cannot cancel task {id} from terminal status {:?}",
                task.status
            )));
        }
        self.with_write(|conn| {
            conn.execute("UPDATE scheduled_tasks SET status = 'cancelled' WHERE id = ?1", params![id])?;
            Ok(())
        })?;
        Ok(ScheduledTask { status: TaskStatus::Cancelled, ..task })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_task_triggers_and_stays_triggered() {
        let storage = Storage::open_in_memory().unwrap();
        let task = storage
            .scheduled_task_create("p1", "ping", "", "in 1 minutes", false, "noop", serde_json::json!({}))
            .unwrap();
        storage
            .with_write(|conn| {
                conn.execute(
                    "UPDATE scheduled_tasks SET next_run = ?1 WHERE id = ?2",
                    params![(Utc::now() - chrono::Duration::seconds(1)).to_rfc3339(), task.id],
                )?;
                Ok(())
            })
            .unwrap();

        let due = storage.check_due("p1").unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].status, TaskStatus::Triggered);

        let completed = storage.scheduled_task_complete(&task.id).unwrap();
        assert_eq!(completed.status, TaskStatus::Completed);
        assert!(storage.scheduled_task_complete(&task.id).is_err());
    }

    #[test]
    fn recurring_task_remains_pending_after_trigger() {
        let storage = Storage::open_in_memory().unwrap();
        let task = storage
            .scheduled_task_create("p1", "sweep", "", "* * * * *", true, "noop", serde_json::json!({}))
            .unwrap();
        storage
            .with_write(|conn| {
                conn.execute(
                    "UPDATE scheduled_tasks SET next_run = ?1 WHERE id = ?2",
                    params![(Utc::now() - chrono::Duration::seconds(1)).to_rfc3339(), task.id],
                )?;
                Ok(())
            })
            .unwrap();

        let due = storage.check_due("p1").unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].status, TaskStatus::Pending);
        assert!(due[0].next_run > task.next_run);
    }

    #[test]
    fn cancel_rejects_terminal_states() {
        let storage = Storage::open_in_memory().unwrap();
        let task = storage
            .scheduled_task_create("p1", "x", "", "in 5 minutes", false, "noop", serde_json::json!({}))
            .unwrap();
        storage.scheduled_task_cancel(&task.id).unwrap();
        assert!(storage.scheduled_task_cancel(&task.id).is_err());
    }

    #[test]
    fn rejects_unrecognized_schedule() {
        let storage = Storage::open_in_memory().unwrap();
        assert!(storage
            .scheduled_task_create("p1", "x", "", "whenever I feel like it", false, "noop", serde_json::json!({}))
            .is_err());
    }
}
