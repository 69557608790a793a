//! HTTP and WebSocket surface of `presenter-api`.

mod mcp_proxy;
mod routes;
mod state;
pub mod system;
pub mod v1;
mod websocket;

#[cfg(test)]
mod mcp_proxy_test;
#[cfg(test)]
mod mod_test;

use miette::Diagnostic;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;

pub use routes::{ApiDoc, create_router};
pub use state::AppState;

/// Errors that stop the API server.
#[derive(Error, Diagnostic, Debug)]
pub enum ApiError {
    #[error("Failed to bind {addr}: {source}")]
    #[diagnostic(
        code(presenter::api::bind),
        help("Another process may already listen on this port; try --port.")
    )]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    #[diagnostic(code(presenter::api::serve))]
    Serve(#[source] std::io::Error),
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    /// Required when stdout carries protocol frames.
    Stderr,
}

/// Initialize tracing subscriber with env filter
pub fn init_tracing(target: LogTarget) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "presenter=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);
    match target {
        LogTarget::Stdout => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogTarget::Stderr => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

/// Serve `state` until Ctrl-C, then stop every presentation run and the
/// upstream tool server.
pub async fn run(config: &AppConfig, state: AppState) -> Result<(), ApiError> {
    let app = create_router(state.clone());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| ApiError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!("API server listening on http://{}", addr);
    info!("OpenAPI docs at http://{}/docs", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ApiError::Serve)?;

    info!("Shutting down");
    state.orchestrator().shutdown().await;
    if let Some(upstream) = state.upstream() {
        upstream.shutdown().await;
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
