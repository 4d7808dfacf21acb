//! # just-memory-core
//!
//! Durable, project-scoped memory engine for long-running LLM agent
//! processes. A single SQLite database backs eleven cooperating
//! components:
//!
//! - **Storage** ([`storage`]): connection lifecycle, migrations, the
//!   single-writer/multi-reader discipline, backup & restore.
//! - **Model Gateway** ([`gateway`]): timeout-gated access to the embedder,
//!   NLI check, and summarizer, degrading to `NotAvailable`/`Timeout`
//!   rather than failing a caller outright.
//! - **Vector Store** ([`vector`]): embedding persistence and k-NN,
//!   transparently backed by either an exact scan or an optional HNSW
//!   side index.
//! - **Memory Core** ([`memory`]): the `memories` table, retention math,
//!   and CRUD.
//! - **Contradiction Engine** ([`contradiction`]): pairwise detection and
//!   a resolution workflow over recorded contradiction edges.
//! - **Graph Layer** ([`graph`]): bi-temporal edges, named entities, and
//!   an entity type hierarchy.
//! - **Search & Activation** ([`search`]): keyword, semantic, and hybrid
//!   retrieval, plus spreading activation for graph-aware recall.
//! - **Session & Tasks** ([`session`]): scratchpad, heartbeat/crash
//!   detection, and the current-task journal.
//! - **Consolidator** ([`consolidation`]): the idle-triggered maintenance
//!   sweep (decay, strengthening, pruning, duplicate/contradiction scans).
//! - **Scheduler** ([`scheduler`]): cron and natural-language scheduled
//!   tasks.
//! - **Briefing & Stats** ([`briefing`]): session-resume summaries,
//!   project counters, and a keyword-weighted suggestion helper.
//!
//! Every component is implemented as an `impl Storage` block (or, where a
//! model call is involved, a free async function taking `&Storage` and
//! `&ModelGateway`) rather than a separate service object — there is one
//! storage handle per process, held behind an `Arc`.

pub mod briefing;
pub mod config;
pub mod consolidation;
pub mod contradiction;
pub mod error;
pub mod gateway;
pub mod graph;
pub mod memory;
pub mod scheduler;
pub mod search;
pub mod session;
pub mod storage;
pub mod vector;

pub use config::{Config, EmbeddingSize, VectorBackend};
pub use error::{CoreError, ErrorKind, Result};
pub use gateway::{GatewayResult, ModelGateway};
pub use memory::{Memory, MemoryType, MemoryUpdate, StoreInput, GLOBAL_PROJECT};
pub use storage::Storage;
