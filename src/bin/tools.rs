//! Backlog tool gateway binary.
//!
//! Serves the tool catalogue either as a line-delimited MCP server on
//! stdin/stdout or as the HTTP bridge used by `presenter-api`.

use std::net::IpAddr;
use std::sync::Arc;

use clap::Parser;
use miette::Diagnostic;
use presenter::api::{self, LogTarget};
use presenter::config::{AppConfig, ConfigError, DEFAULT_TOOLS_PORT};
use presenter::mcp::{RegistryError, ToolError, bridge, stdio};
use presenter::tools::{BacklogConnector, backlog_engine};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Diagnostic, Debug)]
enum BinaryError {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(presenter::binary::config))]
    Config(#[from] ConfigError),

    #[error("Backlog client setup failed: {0}")]
    #[diagnostic(code(presenter::binary::backlog))]
    Backlog(#[from] ToolError),

    #[error("Tool registry is invalid: {0}")]
    #[diagnostic(code(presenter::binary::registry))]
    Registry(#[from] RegistryError),

    #[error("I/O error: {0}")]
    #[diagnostic(code(presenter::binary::io))]
    Io(#[from] std::io::Error),
}

#[derive(Parser)]
#[command(name = "presenter-tools")]
#[command(author, version, about = "Backlog tool server (MCP)", long_about = None)]
struct Cli {
    /// Serve MCP over stdin/stdout instead of HTTP
    #[arg(long)]
    stdio: bool,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_TOOLS_PORT)]
    port: u16,

    /// Backlog space domain, e.g. example.backlog.jp [env: BACKLOG_DOMAIN]
    #[arg(long)]
    backlog_domain: Option<String>,

    /// OAuth token used when a call carries none [env: BACKLOG_ACCESS_TOKEN]
    #[arg(long)]
    backlog_access_token: Option<String>,

    /// API key used when neither the call nor the server has a token [env: BACKLOG_API_KEY]
    #[arg(long)]
    backlog_api_key: Option<String>,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    run().await?;
    Ok(())
}

async fn run() -> Result<(), BinaryError> {
    let cli = Cli::parse();
    // stdout carries protocol frames in stdio mode
    api::init_tracing(if cli.stdio {
        LogTarget::Stderr
    } else {
        LogTarget::Stdout
    });
    presenter::install_crypto_provider();

    let backlog = AppConfig::from_env()?.backlog;
    let connector = BacklogConnector::new(
        cli.backlog_domain.or(backlog.domain).as_deref(),
        cli.backlog_access_token.or(backlog.access_token).as_deref(),
        cli.backlog_api_key.or(backlog.api_key).as_deref(),
    )?;
    if !connector.has_default_credentials() {
        warn!("No default Backlog credentials; calls must carry an accessToken");
    }
    let engine = Arc::new(backlog_engine(Arc::new(connector))?);
    info!(tools = engine.registry().len(), "Tool catalogue loaded");

    if cli.stdio {
        stdio::serve_stdio(&engine).await?;
        return Ok(());
    }

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Tool bridge listening on http://{}", addr);
    axum::serve(listener, bridge::router(engine))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
