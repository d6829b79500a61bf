//! MCP Server implementation

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::mcp::protocol::{
    JsonRpcRequest, JsonRpcResponse, McpToolCall, McpToolDefinition, McpToolResult,
    PROTOCOL_VERSION, error_codes,
};

/// Source of the tools an [`McpServer`] exposes
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Tool definitions, in the order they are advertised
    fn tools(&self) -> Vec<McpToolDefinition>;

    /// Run a tool. Unknown names and bad arguments are reported inside the
    /// result, never as a protocol error.
    async fn call_tool(&self, name: &str, arguments: Value) -> McpToolResult;
}

/// JSON-RPC front end shared by every transport
pub struct McpServer {
    provider: Arc<dyn ToolProvider>,
    server_name: String,
    server_version: String,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(
        provider: Arc<dyn ToolProvider>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            server_name: name.into(),
            server_version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.server_name
    }

    /// Handle an incoming message.
    ///
    /// Returns `None` for notifications, which get no reply.
    pub async fn handle_message(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        if request.is_notification() {
            debug!("MCP notification: {}", request.method);
            return None;
        }
        Some(self.handle_request(request).await)
    }

    /// Handle an incoming JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!("MCP request: {}", request.method);
        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                request.id,
                error_codes::INVALID_REQUEST,
                format!("Unsupported jsonrpc version: {}", request.jsonrpc),
            );
        }

        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "ping" => JsonRpcResponse::success(request.id, serde_json::json!({})),
            "tools/list" => self.handle_list_tools(request.id),
            "tools/call" => self.handle_call_tool(request.id, request.params).await,
            _ => JsonRpcResponse::error(
                request.id,
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": self.server_name,
                    "version": self.server_version
                }
            }),
        )
    }

    fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(id, serde_json::json!({ "tools": self.provider.tools() }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(
                id,
                error_codes::INVALID_PARAMS,
                "Missing params for tools/call",
            );
        };

        let call: McpToolCall = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid tool call params: {}", e),
                );
            }
        };

        let result = self.provider.call_tool(&call.name, call.arguments).await;
        match serde_json::to_value(result) {
            Ok(v) => JsonRpcResponse::success(id, v),
            Err(e) => JsonRpcResponse::error(
                id,
                error_codes::INTERNAL_ERROR,
                format!("Failed to serialize tool result: {}", e),
            ),
        }
    }
}
