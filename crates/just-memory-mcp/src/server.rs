//! MCP Server Core
//!
//! Routes JSON-RPC requests to the tool and resource handlers. The server
//! holds no cognitive state of its own — everything it knows comes from
//! `just_memory_core::Storage` and `just_memory_core::ModelGateway`, both
//! already `Send + Sync` and shared across the stdio loop via `Arc`.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use just_memory_core::{ModelGateway, Storage};
use tracing::{debug, info, warn};

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListResourcesResult,
    ListToolsResult, ReadResourceRequest, ReadResourceResult, ResourceContent, ResourceDescription,
    ServerCapabilities, ServerInfo, ToolDescription,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::resources;
use crate::tools;

/// MCP Server implementation
pub struct McpServer {
    storage: Arc<Storage>,
    gateway: Arc<ModelGateway>,
    initialized: bool,
    /// Unix timestamp (seconds) of the last `tools/call`, shared with the
    /// background consolidation loop as its idle signal.
    last_activity: Arc<AtomicI64>,
}

impl McpServer {
    pub fn new(storage: Arc<Storage>, gateway: Arc<ModelGateway>) -> Self {
        Self::with_activity_handle(storage, gateway, Arc::new(AtomicI64::new(Utc::now().timestamp())))
    }

    /// Construct with an externally-held activity handle so a caller (the
    /// consolidation loop) can read `last_activity` without locking the server.
    pub fn with_activity_handle(storage: Arc<Storage>, gateway: Arc<ModelGateway>, last_activity: Arc<AtomicI64>) -> Self {
        Self { storage, gateway, initialized: false, last_activity }
    }

    /// Clone of the shared last-activity handle, for a background loop that
    /// wants to read it without touching the server itself.
    pub fn activity_handle(&self) -> Arc<AtomicI64> {
        self.last_activity.clone()
    }

    /// Handle an incoming JSON-RPC request
    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling request: {}", request.method);

        if !self.initialized && request.method != "initialize" && request.method != "notifications/initialized" {
            warn!("Rejecting request '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(request.id, JsonRpcError::server_not_initialized()));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "resources/list" => self.handle_resources_list(),
            "resources/read" => self.handle_resources_read(request.params),
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("Unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(&mut self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: Option<InitializeRequest> = match params {
            Some(p) => Some(serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?),
            None => None,
        };
        let client_version = request.and_then(|r| r.protocol_version);

        let negotiated_version = match client_version {
            Some(v) if v.as_str() < MCP_VERSION => {
                info!("Client requested older protocol version {}, using it", v);
                v
            }
            _ => MCP_VERSION.to_string(),
        };

        self.initialized = true;
        info!("MCP session initialized with protocol version {}", negotiated_version);

        let result = InitializeResult {
            protocol_version: negotiated_version,
            capabilities: ServerCapabilities {
                tools: serde_json::json!({ "listChanged": false }),
                resources: serde_json::json!({ "listChanged": false }),
            },
            server_info: ServerInfo {
                name: "just-memory".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let families = [
            tools::memory::schemas(),
            tools::confidence::schemas(),
            tools::graph::schemas(),
            tools::entities::schemas(),
            tools::contradictions::schemas(),
            tools::scheduled::schemas(),
            tools::session::schemas(),
            tools::project::schemas(),
            tools::backup::schemas(),
        ];

        let tools = families
            .into_iter()
            .flatten()
            .map(|(name, description, input_schema)| ToolDescription {
                name: name.to_string(),
                description: description.to_string(),
                input_schema,
            })
            .collect();

        serde_json::to_value(ListToolsResult { tools }).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing arguments")),
        };

        self.last_activity.store(Utc::now().timestamp(), Ordering::Relaxed);

        let storage = &self.storage;
        let gateway = &self.gateway;
        let args = request.arguments;

        let outcome = match request.name.as_str() {
            "memory_store" => tools::memory::execute_store(storage, gateway, args).await,
            "memory_recall" => tools::memory::execute_recall(storage, args),
            "memory_update" => tools::memory::execute_update(storage, gateway, args).await,
            "memory_delete" => tools::memory::execute_delete(storage, args),
            "memory_list" => tools::memory::execute_list(storage, args),
            "memory_search" => tools::memory::execute_search(storage, gateway, args).await,
            "memory_stats" => tools::memory::execute_stats(storage, args),
            "memory_suggest" => tools::memory::execute_suggest(storage, args),
            "memory_find_contradictions" => tools::memory::execute_find_contradictions(storage, gateway, args).await,

            "memory_confirm" => tools::confidence::execute_confirm(storage, args),
            "memory_contradict" => tools::confidence::execute_contradict(storage, args),

            "memory_edge_create" => tools::graph::execute_edge_create(storage, args),
            "memory_edge_query" => tools::graph::execute_edge_query(storage, args),
            "memory_edge_invalidate" => tools::graph::execute_edge_invalidate(storage, args),
            "memory_graph_traverse" => tools::graph::execute_graph_traverse(storage, args),
            "memory_search_contextual" => tools::graph::execute_search_contextual(storage, args).await,

            "memory_entity_create" => tools::entities::execute_entity_create(storage, args),
            "memory_entity_get" => tools::entities::execute_entity_get(storage, args),
            "memory_entity_link" => tools::entities::execute_entity_link(storage, args),
            "memory_entity_search" => tools::entities::execute_entity_search(storage, args),
            "memory_entity_observe" => tools::entities::execute_entity_observe(storage, args),
            "memory_entity_delete" => tools::entities::execute_entity_delete(storage, args),
            "memory_entity_type_define" => tools::entities::execute_entity_type_define(storage, args),
            "memory_entity_type_hierarchy" => tools::entities::execute_entity_type_hierarchy(storage, args),
            "memory_entity_type_list" => tools::entities::execute_entity_type_list(storage, args),
            "memory_entity_type_search_by_hierarchy" => {
                tools::entities::execute_entity_type_search_by_hierarchy(storage, args)
            }

            "memory_contradictions_scan" => tools::contradictions::execute_scan(storage, args),
            "memory_contradictions_pending" => tools::contradictions::execute_pending(storage, args),
            "memory_contradictions_resolve" => tools::contradictions::execute_resolve(storage, args),
            "memory_contradictions_recalibrate" => tools::contradictions::execute_recalibrate(storage, args),

            "memory_briefing" => tools::session::execute_briefing(storage, args),
            "memory_task" => tools::session::execute_task(storage, args),
            "memory_scratch" => tools::session::execute_scratch(storage, args),
            "memory_heartbeat" => tools::session::execute_heartbeat(storage, args),

            "memory_project" => tools::project::execute_project(storage, args),
            "memory_backup" => tools::backup::execute_backup(storage, args),
            "memory_scheduled" => tools::scheduled::execute_scheduled(storage, args),

            other => {
                warn!("Unknown tool: {}", other);
                return Err(JsonRpcError::method_not_found_with_message(&format!("unknown tool: {other}")));
            }
        };

        let result = match outcome {
            Ok(value) => CallToolResult::ok(value),
            Err(err) => CallToolResult::error(err.to_string()),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_resources_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let resources = vec![
            ResourceDescription {
                uri: "memory://stats".to_string(),
                name: "Project stats".to_string(),
                description: "Counts and confidence distribution for a project.".to_string(),
                mime_type: "application/json".to_string(),
            },
            ResourceDescription {
                uri: "memory://recent".to_string(),
                name: "Recent memories".to_string(),
                description: "Most recently stored memories for a project (?n=N, ?project=ID).".to_string(),
                mime_type: "application/json".to_string(),
            },
            ResourceDescription {
                uri: "memory://contradictions/pending".to_string(),
                name: "Pending contradictions".to_string(),
                description: "Unresolved contradiction records for a project.".to_string(),
                mime_type: "application/json".to_string(),
            },
        ];
        serde_json::to_value(ListResourcesResult { resources }).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_resources_read(&self, params: Option<serde_json::Value>) -> Result<serde_json::Value, JsonRpcError> {
        let request: ReadResourceRequest = match params {
            Some(p) => serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?,
            None => return Err(JsonRpcError::invalid_params("missing uri")),
        };

        let text = resources::memory::read(&self.storage, &request.uri)
            .map_err(|e| JsonRpcError::internal_error(&e))?;

        let result = ReadResourceResult {
            contents: vec![ResourceContent {
                uri: request.uri,
                mime_type: "application/json".to_string(),
                text,
            }],
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use just_memory_core::Config;

    fn test_server() -> McpServer {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let gateway = Arc::new(ModelGateway::new(&Config::default()));
        McpServer::new(storage, gateway)
    }

    fn request(method: &str, params: Option<serde_json::Value>) -> JsonRpcRequest {
        JsonRpcRequest { jsonrpc: "2.0".to_string(), id: Some(serde_json::json!(1)), method: method.to_string(), params }
    }

    #[tokio::test]
    async fn rejects_calls_before_initialize() {
        let mut server = test_server();
        let response = server.handle_request(request("tools/list", None)).await.unwrap();
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn initialize_then_list_tools() {
        let mut server = test_server();
        let init = server.handle_request(request("initialize", None)).await.unwrap();
        assert!(init.result.is_some());

        let listed = server.handle_request(request("tools/list", None)).await.unwrap();
        let result = listed.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert!(tools.iter().any(|t| t["name"] == "memory_store"));
        assert!(tools.iter().any(|t| t["name"] == "memory_briefing"));
        assert!(tools.iter().any(|t| t["name"] == "memory_scheduled"));
    }

    #[tokio::test]
    async fn store_and_recall_round_trip() {
        let mut server = test_server();
        server.handle_request(request("initialize", None)).await;

        let store_call = request(
            "tools/call",
            Some(serde_json::json!({
                "name": "memory_store",
                "arguments": {"content": "the deploy key rotates every 90 days", "memory_type": "fact"}
            })),
        );
        let stored = server.handle_request(store_call).await.unwrap();
        assert!(stored.error.is_none(), "{:?}", stored.error);
        let result = stored.result.unwrap();
        assert_eq!(result["isError"], false);
    }

    #[tokio::test]
    async fn unknown_tool_name_errors() {
        let mut server = test_server();
        server.handle_request(request("initialize", None)).await;
        let call = request("tools/call", Some(serde_json::json!({"name": "not_a_tool", "arguments": {}})));
        let response = server.handle_request(call).await.unwrap();
        assert!(response.error.is_some());
    }

    #[tokio::test]
    async fn resources_list_includes_memory_scheme() {
        let mut server = test_server();
        server.handle_request(request("initialize", None)).await;
        let listed = server.handle_request(request("resources/list", None)).await.unwrap();
        let result = listed.result.unwrap();
        let resources = result["resources"].as_array().unwrap();
        assert!(resources.iter().any(|r| r["uri"] == "memory://stats"));
    }

    #[tokio::test]
    async fn ping_is_ok() {
        let mut server = test_server();
        server.handle_request(request("initialize", None)).await;
        let response = server.handle_request(request("ping", None)).await.unwrap();
        assert!(response.result.is_some());
    }
}
