use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::{Value, json};
use tracing::{debug, error, instrument, warn};

use super::error::ToolError;
use super::protocol::{
    CallToolParams, CallToolResult, InitializeResult, JSONRPC_VERSION, JsonRpcError, McpRequest,
    McpResponse, PROTOCOL_VERSION, ServerInfo,
};
use super::registry::{ToolContext, ToolRegistry};

/// Transport-independent JSON-RPC dispatcher.
///
/// Holds no per-connection state, so one engine serves stdio and HTTP alike.
#[derive(Clone)]
pub struct McpEngine {
    registry: Arc<ToolRegistry>,
    server_info: ServerInfo,
}

impl McpEngine {
    pub fn new(registry: Arc<ToolRegistry>, server_info: ServerInfo) -> Self {
        Self {
            registry,
            server_info,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub async fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        self.handle_with(request, &ToolContext::default()).await
    }

    /// Dispatch one request. Notifications yield `None`.
    #[instrument(skip_all, fields(method = %request.method))]
    pub async fn handle_with(&self, request: McpRequest, ctx: &ToolContext) -> Option<McpResponse> {
        if request.is_notification() {
            debug!("Notification received");
            return None;
        }
        let id = request.id.clone();

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(McpResponse::error(
                id,
                JsonRpcError::invalid_request(format!(
                    "unsupported jsonrpc version '{}'",
                    request.jsonrpc
                )),
            ));
        }

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.registry.list() })),
            "tools/call" => self.dispatch_call(request.params, ctx).await,
            other => Err(JsonRpcError::method_not_found(other)),
        };

        Some(match outcome {
            Ok(result) => McpResponse::success(id, result),
            Err(err) => McpResponse::error(id, err),
        })
    }

    fn initialize(&self) -> Value {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: json!({ "tools": {} }),
            server_info: self.server_info.clone(),
        };
        serde_json::to_value(result).unwrap_or(Value::Null)
    }

    async fn dispatch_call(
        &self,
        params: Option<Value>,
        ctx: &ToolContext,
    ) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::invalid_params("Missing params"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {e}")))
            })?;

        let result = self.call_tool(&params.name, params.arguments, ctx).await?;
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
    }

    /// Validate and run a tool. Handler errors and panics are contained here.
    #[instrument(skip(self, arguments, ctx))]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        ctx: &ToolContext,
    ) -> Result<CallToolResult, ToolError> {
        let tool = self.registry.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        let args = tool.input_schema.validate(arguments)?;

        match AssertUnwindSafe(tool.handler.call(ctx, args))
            .catch_unwind()
            .await
        {
            Ok(Ok(value)) => Ok(CallToolResult::json(&value)),
            Ok(Err(err)) => {
                warn!(tool = name, error = %err, "Tool call failed");
                Err(err)
            }
            Err(_) => {
                error!(tool = name, "Tool handler panicked");
                Err(ToolError::Internal {
                    message: format!("Tool '{name}' panicked"),
                })
            }
        }
    }
}
