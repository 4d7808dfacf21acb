//! Shared test harness for `just-memory`'s cross-module scenarios.
//!
//! The tool-dispatch layer (JSON-RPC orchestration in `just-memory-mcp`)
//! isn't exercised here directly since it's a binary crate; instead
//! [`harness::orchestration`] replicates its `store` → embed → contradiction
//! detection flow against the real `just-memory-core` API, the same way the
//! MCP tool handlers do it, so these tests exercise real cross-module
//! behavior rather than a single module in isolation.

pub mod harness;
pub mod mocks;
