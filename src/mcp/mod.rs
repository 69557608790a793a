//! Model Context Protocol plumbing.
//!
//! - **engine**: stateless JSON-RPC dispatcher over a [`ToolRegistry`]
//! - **stdio** / **bridge**: line-delimited and HTTP transports for the engine
//! - **session** / **upstream**: response correlation for a proxied stdio tool server
//! - **client**: the [`ToolInvoker`] seam used by generation and project routes

pub mod bridge;
mod client;
mod engine;
mod error;
pub mod protocol;
mod registry;
mod session;
pub mod stdio;
mod upstream;

#[cfg(test)]
mod bridge_test;
#[cfg(test)]
mod engine_test;
#[cfg(test)]
mod registry_test;
#[cfg(test)]
mod stdio_test;

#[cfg(test)]
pub use client::MockToolInvoker;
pub use client::{BridgeClient, ToolCall, ToolInvoker};
pub use engine::McpEngine;
pub use error::ToolError;
pub use protocol::{JsonRpcError, McpRequest, McpResponse, RequestId, ServerInfo};
pub use registry::{
    InputSchema, Property, PropertyType, RegistryError, ToolArguments, ToolContext,
    ToolDefinition, ToolHandler, ToolRegistry,
};
pub use session::{DEFAULT_RESPONSE_TIMEOUT, PendingResponse, SessionError, SessionManager};
pub use upstream::StdioUpstream;
