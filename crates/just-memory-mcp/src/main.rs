//! just-memory MCP server
//!
//! Exposes `just-memory-core`'s tool surface to an agent over the Model
//! Context Protocol (JSON-RPC 2.0 on stdio): memory CRUD and hybrid search,
//! the bi-temporal edge graph and named-entity graph, the contradiction
//! workflow, session/task/scratchpad state, and the scheduler.
//!
//! Two background loops run alongside the stdio loop: an idle-triggered
//! consolidation sweep per project, and a scheduler poll that triggers due
//! tasks. Neither sits on the request path — a slow or failing tick only
//! delays the next one.

mod protocol;
mod resources;
mod server;
mod tools;

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use just_memory_core::{consolidation, Config, ModelGateway, Storage};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use crate::protocol::stdio::StdioTransport;
use crate::server::McpServer;

/// Parse command-line arguments and return the optional data directory path.
/// Returns `None` for the path if no `--data-dir` was specified.
/// Exits the process if `--help` or `--version` is requested.
fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut data_dir: Option<PathBuf> = None;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("just-memory-mcp v{}", env!("CARGO_PKG_VERSION"));
                println!();
                println!("Persistent, project-scoped memory for agent processes, exposed over MCP.");
                println!();
                println!("USAGE:");
                println!("    just-memory-mcp [OPTIONS]");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help              Print help information");
                println!("    -V, --version           Print version information");
                println!("    --data-dir <PATH>       Custom data directory");
                println!();
                println!("ENVIRONMENT:");
                println!("    RUST_LOG                        Log level filter (e.g., debug, info, warn, error)");
                println!("    JUST_MEMORY_EMBEDDING_SIZE       small|large (default: small)");
                println!("    JUST_MEMORY_VECTOR_BACKEND       exact|hnsw (default: exact)");
                println!("    JUST_MEMORY_WRITER_CONCURRENCY   positive integer (default: 1)");
                println!("    JUST_MEMORY_CLAUDE_DESKTOP_MODE  1|true|yes to cap model-call budgets");
                println!("    JUST_MEMORY_DATA_DIR             overridden by --data-dir when both are set");
                println!();
                println!("EXAMPLES:");
                println!("    just-memory-mcp");
                println!("    just-memory-mcp --data-dir /custom/path");
                println!("    RUST_LOG=debug just-memory-mcp");
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("just-memory-mcp {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--data-dir" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("error: --data-dir requires a path argument");
                    eprintln!("Usage: just-memory-mcp --data-dir <PATH>");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(&args[i]));
            }
            arg if arg.starts_with("--data-dir=") => {
                let path = arg.strip_prefix("--data-dir=").unwrap_or("");
                if path.is_empty() {
                    eprintln!("error: --data-dir requires a path argument");
                    eprintln!("Usage: just-memory-mcp --data-dir <PATH>");
                    std::process::exit(1);
                }
                data_dir = Some(PathBuf::from(path));
            }
            arg => {
                eprintln!("error: unknown argument '{}'", arg);
                eprintln!("Usage: just-memory-mcp [OPTIONS]");
                eprintln!("Try 'just-memory-mcp --help' for more information.");
                std::process::exit(1);
            }
        }
        i += 1;
    }

    data_dir
}

/// Idle-triggered consolidation sweep, one project at a time. `last_activity`
/// is the shared handle the MCP server stamps on every `tools/call`.
async fn run_consolidation_loop(storage: Arc<Storage>, last_activity: Arc<AtomicI64>) {
    let mut last_run: Option<DateTime<Utc>> = None;
    let tick = std::time::Duration::from_secs(60);

    loop {
        tokio::time::sleep(tick).await;

        let now = Utc::now();
        let last_activity = Utc.timestamp_opt(last_activity.load(Ordering::Relaxed), 0).single().unwrap_or(now);
        if !consolidation::should_run(last_run, last_activity, now) {
            continue;
        }

        let projects = match storage.list_projects() {
            Ok(p) => p,
            Err(e) => {
                warn!("could not list projects for consolidation: {}", e);
                continue;
            }
        };

        for project_id in &projects {
            match storage.run_consolidation(project_id) {
                Ok(report) => info!(project = %project_id, ?report, "consolidation sweep complete"),
                Err(e) => warn!(project = %project_id, "consolidation sweep failed: {}", e),
            }
        }

        last_run = Some(now);
    }
}

/// Poll for due scheduled tasks every project, every tick.
async fn run_scheduler_loop(storage: Arc<Storage>) {
    let tick = std::time::Duration::from_secs(30);
    loop {
        tokio::time::sleep(tick).await;

        let projects = match storage.list_projects() {
            Ok(p) => p,
            Err(e) => {
                warn!("could not list projects for scheduler poll: {}", e);
                continue;
            }
        };

        for project_id in &projects {
            match storage.check_due(project_id) {
                Ok(triggered) if !triggered.is_empty() => {
                    info!(project = %project_id, count = triggered.len(), "scheduled tasks triggered");
                }
                Ok(_) => {}
                Err(e) => warn!(project = %project_id, "scheduler poll failed: {}", e),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let data_dir = parse_args();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false)
        .init();

    info!("just-memory-mcp v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env();
    if let Some(dir) = data_dir {
        config.data_dir = Some(dir);
    }

    let storage = match Storage::open(&config) {
        Ok(s) => {
            info!("storage initialized at {:?}", s.data_dir());
            Arc::new(s)
        }
        Err(e) => {
            error!("failed to initialize storage: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = storage.seed_default_entity_types() {
        error!("failed to seed default entity types: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = storage.stamp_embedding_dimension(config.embedding_size) {
        error!("embedding dimension mismatch: {}", e);
        std::process::exit(1);
    }

    let gateway = Arc::new(ModelGateway::new(&config));
    {
        let gateway = gateway.clone();
        tokio::spawn(async move {
            gateway.warm_embedder().await;
            info!("embedder warmed");
        });
    }

    let activity = Arc::new(AtomicI64::new(Utc::now().timestamp()));
    let server = McpServer::with_activity_handle(storage.clone(), gateway, activity.clone());

    tokio::spawn(run_consolidation_loop(storage.clone(), activity));
    tokio::spawn(run_scheduler_loop(storage));

    let transport = StdioTransport::new();

    info!("starting MCP server on stdio...");
    if let Err(e) = transport.run(server).await {
        error!("server error: {}", e);
        std::process::exit(1);
    }

    info!("just-memory-mcp shutting down");
}
