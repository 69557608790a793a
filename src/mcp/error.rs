use miette::Diagnostic;
use thiserror::Error;

use super::protocol::{JsonRpcError, error_codes};

/// Failure while executing a tool, on either side of the bridge.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Invalid arguments: {message}")]
    #[diagnostic(code(presenter::mcp::invalid_arguments))]
    InvalidArguments { message: String },

    #[error("Unknown tool: {name}")]
    #[diagnostic(code(presenter::mcp::unknown_tool))]
    UnknownTool { name: String },

    #[error(
        "No credentials configured. Please provide accessToken in request or configure environment variables."
    )]
    #[diagnostic(
        code(presenter::mcp::no_credentials),
        help("Set BACKLOG_DOMAIN with BACKLOG_API_KEY or BACKLOG_ACCESS_TOKEN.")
    )]
    NoCredentials,

    #[error("Backlog API error ({status}): {message}")]
    #[diagnostic(code(presenter::mcp::backlog))]
    Backlog { status: u16, message: String },

    #[error("Network error: {message}")]
    #[diagnostic(code(presenter::mcp::network))]
    Network { message: String },

    #[error("Tool call failed ({code}): {message}")]
    #[diagnostic(code(presenter::mcp::remote))]
    Remote { code: i32, message: String },

    #[error("Invalid tool response: {message}")]
    #[diagnostic(code(presenter::mcp::invalid_response))]
    InvalidResponse { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(presenter::mcp::internal))]
    Internal { message: String },
}

impl ToolError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            message: message.into(),
        }
    }

    /// JSON-RPC code reported for this failure.
    pub fn rpc_code(&self) -> i32 {
        match self {
            ToolError::InvalidArguments { .. } => error_codes::INVALID_PARAMS,
            ToolError::UnknownTool { .. } => error_codes::METHOD_NOT_FOUND,
            ToolError::Remote { code, .. } => *code,
            _ => error_codes::INTERNAL_ERROR,
        }
    }
}

impl From<ToolError> for JsonRpcError {
    fn from(err: ToolError) -> Self {
        let message = match &err {
            ToolError::Remote { message, .. } => message.clone(),
            other => other.to_string(),
        };
        JsonRpcError::new(err.rpc_code(), message)
    }
}

impl From<JsonRpcError> for ToolError {
    fn from(err: JsonRpcError) -> Self {
        ToolError::Remote {
            code: err.code,
            message: err.message,
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        ToolError::Network {
            message: err.to_string(),
        }
    }
}
