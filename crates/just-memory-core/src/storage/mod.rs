//! Storage Layer (C1).
//!
//! Owns the sqlite connections, schema migrations, write-lock discipline,
//! and backup/restore. Domain operations (memory CRUD, graph, contradiction
//! workflow, session state, consolidation, scheduler, briefing) are
//! implemented as `impl Storage` blocks living in their own component
//! modules, each operating through [`Storage::with_write`] /
//! [`Storage::with_read`] so write ordering stays centralized here.

mod backup;
pub mod migrations;

pub use backup::{BackupArtifact, BackupCounts, RestoreMode};

use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::Config;
use crate::error::{CoreError, Result};

/// Number of StorageBusy retries before the error surfaces to the caller
/// (retried up to three times with exponential backoff).
const BUSY_RETRY_ATTEMPTS: u32 = 3;

/// Durable, single-node storage handle. `Send + Sync`: callers hold
/// `Arc<Storage>` rather than `Arc<Mutex<Storage>>`, the same rationale the
/// teacher's `sqlite.rs` documents for its own `Storage`.
pub struct Storage {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    data_dir: PathBuf,
    db_path: PathBuf,
    /// Bounded write concurrency permit count (the configurable
    /// writer-concurrency knob; the mutex above already serializes to 1,
    /// this tracks how many callers are *waiting*, used only for metrics).
    writers_waiting: AtomicUsize,
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA temp_store = MEMORY;",
    )?;
    Ok(())
}

fn default_data_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("dev", "just-memory", "just-memory")
        .ok_or_else(|| CoreError::Schema("could not determine project data directory".into()))?;
    Ok(proj_dirs.data_dir().to_path_buf())
}

impl Storage {
    /// Open (or create) the database at `config.data_dir` (or the platform
    /// default), applying migrations and PRAGMAs. Schema migration failure
    /// is fatal.
    pub fn open(config: &Config) -> Result<Self> {
        let data_dir = match &config.data_dir {
            Some(p) => p.clone(),
            None => default_data_dir()?,
        };
        std::fs::create_dir_all(&data_dir)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&data_dir, std::fs::Permissions::from_mode(0o700));
        }

        let db_path = data_dir.join("just-memory.db");
        Self::open_at(db_path, data_dir)
    }

    /// Open a database at an explicit path (used by tests and `--data-dir`).
    pub fn open_at(db_path: PathBuf, data_dir: PathBuf) -> Result<Self> {
        let mut writer_conn = Connection::open(&db_path)?;
        configure_connection(&writer_conn)?;
        migrations::apply_migrations(&mut writer_conn)?;

        #[cfg(unix)]
        if db_path.exists() {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&db_path, std::fs::Permissions::from_mode(0o600));
        }

        let reader_conn = Connection::open(&db_path)?;
        configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            data_dir,
            db_path,
            writers_waiting: AtomicUsize::new(0),
        })
    }

    /// In-memory database for tests; not a substitute for `open_at` in
    /// anything that exercises backup/restore (those need a real path).
    #[cfg(any(test, feature = "test-util"))]
    pub fn open_in_memory() -> Result<Self> {
        let mut writer_conn = Connection::open_in_memory()?;
        configure_connection(&writer_conn)?;
        migrations::apply_migrations(&mut writer_conn)?;
        let reader_conn = Connection::open_in_memory()?;
        configure_connection(&reader_conn)?;
        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            data_dir: PathBuf::from("."),
            db_path: PathBuf::from(":memory:"),
            writers_waiting: AtomicUsize::new(0),
        })
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    /// Acquire the single write connection and run `f` against it. Retries
    /// on lock contention up to [`BUSY_RETRY_ATTEMPTS`] times with
    /// exponential backoff before surfacing `StorageBusy`.
    pub fn with_write<T>(&self, f: impl Fn(&Connection) -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            self.writers_waiting.fetch_add(1, Ordering::SeqCst);
            let guard = self.writer.lock();
            self.writers_waiting.fetch_sub(1, Ordering::SeqCst);
            let conn = guard.map_err(|_| CoreError::StorageBusy("writer lock poisoned".into()))?;
            match f(&conn) {
                Ok(v) => return Ok(v),
                Err(CoreError::Storage(e)) if is_busy(&e) && attempt < BUSY_RETRY_ATTEMPTS => {
                    drop(conn);
                    attempt += 1;
                    std::thread::sleep(Duration::from_millis(50 * 2u64.pow(attempt)));
                    continue;
                }
                Err(CoreError::Storage(e)) if is_busy(&e) => {
                    return Err(CoreError::StorageBusy(e.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Acquire the shared read connection. Multiple readers proceed in
    /// parallel at the SQLite level; this mutex only protects Rust's
    /// `&Connection` aliasing rule, not transaction semantics.
    pub fn with_read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .reader
            .lock()
            .map_err(|_| CoreError::StorageBusy("reader lock poisoned".into()))?;
        f(&conn)
    }

    /// Run `f` inside a single write transaction, committing only if `f`
    /// succeeds (used by multi-row resolution operations).
    pub fn with_transaction<T>(&self, f: impl Fn(&rusqlite::Transaction) -> Result<T>) -> Result<T> {
        self.with_write(|conn| {
            // SAFETY-by-convention: `Connection::unchecked_transaction` lets us
            // take a transaction through a shared `&Connection` while still
            // holding the single writer mutex, which is the only thing that
            // actually serializes mutation.
            let tx = conn
                .unchecked_transaction()
                .map_err(CoreError::from)?;
            let result = f(&tx)?;
            tx.commit().map_err(CoreError::from)?;
            Ok(result)
        })
    }
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(ffi_err, _)
            if ffi_err.code == rusqlite::ErrorCode::DatabaseBusy
    )
}
