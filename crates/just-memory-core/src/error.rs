//! Crate-wide error taxonomy.
//!
//! Every fallible operation in `just-memory-core` returns `CoreError`.
//! Callers match on `kind()` rather than on the `Display` text, which is
//! free to change.

use rusqlite::Error as SqliteError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The full error taxonomy. Each variant is a "kind", not a type hierarchy —
/// callers are expected to match on this enum directly.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An input failed a length/count/range constraint before it touched storage.
    #[error("validation error: {0}")]
    Validation(String),

    /// No row/entity/edge matches the given id or name.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create-if-absent operation found an existing row and merged into it.
    /// Not fatal — reported to the caller as information, not failure.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A core-owned invariant would be violated by this write. Always a
    /// bug in the caller or a corrupted row; logged.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A contradiction resolution referenced a memory that no longer exists.
    #[error("referential integrity error: {0}")]
    ReferentialIntegrity(String),

    /// A model-gateway call exceeded its budget.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A model or index is not configured/loaded; quality degrades, the call
    /// still succeeds at the data-path level.
    #[error("not available: {0}")]
    NotAvailable(String),

    /// The write lock could not be acquired after the retry budget.
    #[error("storage busy: {0}")]
    StorageBusy(String),

    /// Migration failed; the process must refuse to start.
    #[error("schema error: {0}")]
    Schema(String),

    /// Lower-level sqlite error that doesn't map cleanly onto a spec kind.
    #[error("storage error: {0}")]
    Storage(#[from] SqliteError),

    /// Filesystem / IO error (backup artifacts, data directory setup).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization of an opaque column (tags, metadata, action_data).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable, machine-matchable error kind, independent of the `Display` text.
/// This is what `just-memory-mcp`'s tool surface serializes into `{"error": kind, ...}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    AlreadyExists,
    InvariantViolation,
    ReferentialIntegrityError,
    Timeout,
    NotAvailable,
    StorageBusy,
    SchemaError,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) => ErrorKind::ValidationError,
            CoreError::NotFound(_) => ErrorKind::NotFound,
            CoreError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            CoreError::InvariantViolation(_) => ErrorKind::InvariantViolation,
            CoreError::ReferentialIntegrity(_) => ErrorKind::ReferentialIntegrityError,
            CoreError::Timeout(_) => ErrorKind::Timeout,
            CoreError::NotAvailable(_) => ErrorKind::NotAvailable,
            CoreError::StorageBusy(_) => ErrorKind::StorageBusy,
            CoreError::Schema(_) => ErrorKind::SchemaError,
            // Lower-level errors surface as invariant violations: something
            // the caller could not have validated against went wrong in storage.
            CoreError::Storage(_) | CoreError::Io(_) | CoreError::Serialization(_) => {
                ErrorKind::InvariantViolation
            }
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        CoreError::NotFound(msg.into())
    }
}
