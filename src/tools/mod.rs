//! Backlog data tools served by `presenter-tools`.

mod backlog;
mod catalog;


use std::sync::Arc;

pub use backlog::{BacklogAuth, BacklogClient, BacklogConnector, HttpMethod, encode_params};
pub use catalog::backlog_tools;

use crate::mcp::{McpEngine, RegistryError, ServerInfo, ToolRegistry};

pub const SERVER_NAME: &str = "presenter-backlog-tools";

pub fn backlog_registry(connector: Arc<BacklogConnector>) -> Result<ToolRegistry, RegistryError> {
    ToolRegistry::builder()
        .extend(backlog_tools(connector))
        .build()
}

/// Engine serving the Backlog catalogue.
pub fn backlog_engine(connector: Arc<BacklogConnector>) -> Result<McpEngine, RegistryError> {
    let registry = backlog_registry(connector)?;
    Ok(McpEngine::new(
        Arc::new(registry),
        ServerInfo::new(SERVER_NAME, env!("CARGO_PKG_VERSION")),
    ))
}
