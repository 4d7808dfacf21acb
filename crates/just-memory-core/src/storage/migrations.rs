//! Schema migrations.
//!
//! Versioned, idempotent, applied in order against `schema_migrations`
//! (teacher's `MIGRATIONS`/`schema_version` pattern in `storage/migrations.rs`,
//! generalized away from a spaced-repetition schema to this crate's data model).

use rusqlite::Connection;

use crate::error::{CoreError, Result};

/// A single schema migration.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Core schema: memories, embeddings, edges, entities, scratchpad",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Full-text index over memories.content with sync triggers",
        up: MIGRATION_V2_UP,
    },
    Migration {
        version: 3,
        description: "Scheduled tasks, tool-call log, contradiction resolutions, gateway metadata",
        up: MIGRATION_V3_UP,
    },
    Migration {
        version: 4,
        description: "contradiction_resolutions.kind, so recalibration can tell a memory-removing resolution from keep_both",
        up: MIGRATION_V4_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    content TEXT NOT NULL,
    memory_type TEXT NOT NULL DEFAULT 'note',
    tags TEXT NOT NULL DEFAULT '[]',
    importance REAL NOT NULL DEFAULT 0.5,
    confidence REAL NOT NULL DEFAULT 0.5,
    strength REAL NOT NULL DEFAULT 1.0,
    access_count INTEGER NOT NULL DEFAULT 0,
    source_count INTEGER NOT NULL DEFAULT 1,
    contradiction_count INTEGER NOT NULL DEFAULT 0,
    last_accessed TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_project ON memories(project_id, deleted_at);
CREATE INDEX IF NOT EXISTS idx_memories_updated ON memories(updated_at);

CREATE TABLE IF NOT EXISTS memory_embeddings (
    memory_id TEXT PRIMARY KEY REFERENCES memories(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL,
    dimensions INTEGER NOT NULL,
    model TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS edges (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    from_id TEXT NOT NULL,
    to_id TEXT NOT NULL,
    relation_type TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0.5,
    metadata TEXT NOT NULL DEFAULT '{}',
    valid_from TEXT NOT NULL,
    valid_to TEXT
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON edges(from_id, project_id);
CREATE INDEX IF NOT EXISTS idx_edges_to ON edges(to_id, project_id);
CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation_type);

CREATE TABLE IF NOT EXISTS entities (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    observations TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(project_id, name)
);

CREATE INDEX IF NOT EXISTS idx_entities_project_type ON entities(project_id, entity_type);

CREATE TABLE IF NOT EXISTS entity_relations (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    from_entity TEXT NOT NULL,
    relation_type TEXT NOT NULL,
    to_entity TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(project_id, from_entity, relation_type, to_entity)
);

CREATE TABLE IF NOT EXISTS entity_types (
    name TEXT PRIMARY KEY,
    parent_type TEXT,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS scratchpad (
    key TEXT NOT NULL,
    project_id TEXT NOT NULL,
    value TEXT NOT NULL,
    expires_at TEXT,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (key, project_id)
);

CREATE INDEX IF NOT EXISTS idx_scratchpad_expires ON scratchpad(expires_at);
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    content,
    content='memories',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS memories_fts_insert AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts(rowid, content) VALUES (new.rowid, new.content);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_update AFTER UPDATE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
    INSERT INTO memories_fts(rowid, content) VALUES (new.rowid, new.content);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_delete AFTER DELETE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
END;
"#;

const MIGRATION_V3_UP: &str = r#"
CREATE TABLE IF NOT EXISTS scheduled_tasks (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    schedule TEXT NOT NULL,
    cron_expression TEXT,
    next_run TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    recurring INTEGER NOT NULL DEFAULT 0,
    action_type TEXT NOT NULL DEFAULT '',
    action_data TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scheduled_tasks_due ON scheduled_tasks(project_id, status, next_run);

CREATE TABLE IF NOT EXISTS tool_call_log (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    tool_name TEXT NOT NULL,
    arguments TEXT NOT NULL DEFAULT '{}',
    success INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_tool_call_log_timestamp ON tool_call_log(timestamp);

CREATE TABLE IF NOT EXISTS contradiction_resolutions (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    memory_id_1 TEXT NOT NULL,
    memory_id_2 TEXT NOT NULL,
    edge_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    chosen_memory TEXT,
    note TEXT,
    resolved_at TEXT,
    created_at TEXT NOT NULL,
    UNIQUE(edge_id)
);

CREATE INDEX IF NOT EXISTS idx_contradiction_resolutions_status
    ON contradiction_resolutions(project_id, status);

CREATE TABLE IF NOT EXISTS gateway_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const MIGRATION_V4_UP: &str = r#"
ALTER TABLE contradiction_resolutions ADD COLUMN kind TEXT;
"#;

/// Apply every migration whose version exceeds the current
/// `schema_migrations` row count, in order, inside one transaction each.
/// Migration failure is fatal (`SchemaError`).
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        );",
    )
    .map_err(|e| CoreError::Schema(format!("failed creating schema_migrations: {e}")))?;

    let current: u32 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |r| r.get(0))
        .map_err(|e| CoreError::Schema(format!("failed reading schema_migrations: {e}")))?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Schema(format!("failed starting migration tx: {e}")))?;

        tx.execute_batch(migration.up).map_err(|e| {
            CoreError::Schema(format!(
                "migration {} ({}) failed: {e}",
                migration.version, migration.description
            ))
        })?;

        tx.execute(
            "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![
                migration.version,
                migration.description,
                chrono::Utc::now().to_rfc3339()
            ],
        )
        .map_err(|e| CoreError::Schema(format!("failed recording migration: {e}")))?;

        tx.commit()
            .map_err(|e| CoreError::Schema(format!("failed committing migration: {e}")))?;
    }

    Ok(())
}
