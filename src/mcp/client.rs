use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::engine::McpEngine;
use super::error::ToolError;
use super::protocol::{CallToolResult, error_codes};
use super::registry::ToolContext;

const BRIDGE_TIMEOUT: Duration = Duration::from_secs(30);

/// One tool invocation as the orchestrator and project routes issue it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
    pub access_token: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            access_token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }
}

/// Runs a tool and returns its decoded JSON payload.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    async fn call_tool(&self, call: ToolCall) -> Result<Value, ToolError>;
}

#[async_trait]
impl ToolInvoker for McpEngine {
    async fn call_tool(&self, call: ToolCall) -> Result<Value, ToolError> {
        let ctx = ToolContext::with_token(call.access_token);
        let result = McpEngine::call_tool(self, &call.name, call.arguments, &ctx).await?;
        decode(&result)
    }
}

#[derive(Serialize)]
struct BridgeRequest<'a> {
    tool: &'a str,
    args: &'a Value,
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    access_token: Option<&'a str>,
}

#[derive(Deserialize)]
struct BridgeReply {
    #[serde(default)]
    result: Option<CallToolResult>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    code: Option<i32>,
}

/// HTTP client for a `presenter-tools` gateway.
#[derive(Clone)]
pub struct BridgeClient {
    client: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(base_url: &str) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder().timeout(BRIDGE_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ToolInvoker for BridgeClient {
    #[instrument(skip(self, call), fields(tool = %call.name))]
    async fn call_tool(&self, call: ToolCall) -> Result<Value, ToolError> {
        let body = BridgeRequest {
            tool: &call.name,
            args: &call.arguments,
            access_token: call.access_token.as_deref(),
        };
        let response = self
            .client
            .post(format!("{}/mcp/call", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), bytes = text.len(), "Bridge replied");

        let reply: BridgeReply = serde_json::from_str(&text).map_err(|_| {
            if status.is_success() {
                ToolError::InvalidResponse {
                    message: format!("unparsable bridge reply: {text}"),
                }
            } else {
                ToolError::Remote {
                    code: error_codes::INTERNAL_ERROR,
                    message: format!("bridge HTTP {}: {text}", status.as_u16()),
                }
            }
        })?;

        if let Some(message) = reply.error {
            return Err(ToolError::Remote {
                code: reply.code.unwrap_or(error_codes::INTERNAL_ERROR),
                message,
            });
        }
        if !status.is_success() {
            return Err(ToolError::Remote {
                code: error_codes::INTERNAL_ERROR,
                message: format!("bridge HTTP {}", status.as_u16()),
            });
        }
        let result = reply.result.ok_or_else(|| ToolError::InvalidResponse {
            message: "bridge reply has no result".to_string(),
        })?;
        decode(&result)
    }
}

fn decode(result: &CallToolResult) -> Result<Value, ToolError> {
    result.payload().ok_or_else(|| ToolError::InvalidResponse {
        message: "tool returned no content".to_string(),
    })
}
