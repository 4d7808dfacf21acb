//! Test harness: disk-backed storage management and cross-module
//! orchestration helpers that stand in for the MCP tool layer.

mod db_manager;
pub mod orchestration;

pub use db_manager::TestDatabaseManager;
