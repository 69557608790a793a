//! Application state for the API server.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::generation::Orchestrator;
use crate::mcp::StdioUpstream;

/// Shared application state.
///
/// Cheap to clone: the orchestrator and upstream are shared handles.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Orchestrator,
    config: Arc<AppConfig>,
    upstream: Option<Arc<StdioUpstream>>,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: AppConfig) -> Self {
        Self {
            orchestrator,
            config: Arc::new(config),
            upstream: None,
        }
    }

    /// Attach the child tool server that backs the `/mcp` proxy.
    pub fn with_upstream(mut self, upstream: Arc<StdioUpstream>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn upstream(&self) -> Option<&Arc<StdioUpstream>> {
        self.upstream.as_ref()
    }
}
