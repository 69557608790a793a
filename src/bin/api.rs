//! Presenter API server binary.
//!
//! Wires the provider chains, the audio cache and the tool client into the
//! orchestrator and serves the HTTP/WebSocket API.

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use miette::Diagnostic;
use presenter::api::{self, ApiError, AppState, LogTarget};
use presenter::cache::{AudioCache, CacheError, SpeechService};
use presenter::config::{AppConfig, ConfigError};
use presenter::generation::Orchestrator;
use presenter::mcp::{BridgeClient, SessionError, SessionManager, StdioUpstream, ToolError};
use presenter::providers::{ProviderError, SpeechChain, TextChain};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Diagnostic, Debug)]
enum BinaryError {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(presenter::binary::config))]
    Config(#[from] ConfigError),

    #[error("Provider setup failed: {0}")]
    #[diagnostic(code(presenter::binary::provider))]
    Provider(#[from] ProviderError),

    #[error("Audio cache unavailable: {0}")]
    #[diagnostic(code(presenter::binary::cache))]
    Cache(#[from] CacheError),

    #[error("Tool client setup failed: {0}")]
    #[diagnostic(code(presenter::binary::tools))]
    Tools(#[from] ToolError),

    #[error("Tool server failed to start: {0}")]
    #[diagnostic(
        code(presenter::binary::upstream),
        help("Check MCP_TOOL_COMMAND, e.g. 'presenter-tools --stdio'.")
    )]
    Upstream(#[from] SessionError),

    #[error("API server error: {0}")]
    #[diagnostic(code(presenter::binary::api))]
    Api(#[from] ApiError),
}

#[derive(Parser)]
#[command(name = "presenter-api")]
#[command(author, version, about = "Narrated slide generation server", long_about = None)]
struct Cli {
    /// Host address to bind to
    #[arg(long, env = "HOST")]
    host: Option<IpAddr>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Directory for synthesized audio
    #[arg(long, env = "AUDIO_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Child tool server backing the /mcp proxy, e.g. "presenter-tools --stdio"
    #[arg(long, env = "MCP_TOOL_COMMAND")]
    tool_command: Option<String>,
}

impl Cli {
    fn apply(self, mut config: AppConfig) -> AppConfig {
        if let Some(host) = self.host {
            config = config.with_host(host);
        }
        if let Some(port) = self.port {
            config = config.with_port(port);
        }
        if let Some(dir) = self.cache_dir {
            config = config.with_audio_cache_dir(dir);
        }
        config.with_tool_command(self.tool_command)
    }
}

async fn start_upstream(command_line: &str) -> Result<StdioUpstream, SessionError> {
    let mut parts = command_line.split_whitespace().map(str::to_string);
    let command = parts.next().unwrap_or_default();
    let args: Vec<String> = parts.collect();
    StdioUpstream::spawn(&command, &args, SessionManager::default()).await
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    run().await?;
    Ok(())
}

async fn run() -> Result<(), BinaryError> {
    let cli = Cli::parse();
    api::init_tracing(LogTarget::Stdout);
    presenter::install_crypto_provider();

    let config = cli.apply(AppConfig::from_env()?);

    let text = TextChain::from_settings(&config.text)?;
    info!(providers = ?text.provider_names(), "Text providers ready");
    let speech_chain = SpeechChain::from_settings(&config.speech)?;
    info!(engines = ?speech_chain.engine_kinds(), "Speech engines ready");

    let cache = Arc::new(
        AudioCache::new(&config.audio_cache_dir)?.with_url_prefix(&config.audio_url_prefix),
    );
    info!(
        dir = %config.audio_cache_dir.display(),
        url_prefix = %config.audio_url_prefix,
        entries = cache.len(),
        "Audio cache opened"
    );
    let speech = SpeechService::new(cache, speech_chain);

    let tools = BridgeClient::new(&config.mcp_backlog_url)?;
    info!(url = %config.mcp_backlog_url, "Tool bridge client ready");

    let orchestrator = Orchestrator::new(Arc::new(tools), text, speech);
    let mut state = AppState::new(orchestrator, config.clone());

    match config.mcp_tool_command.as_deref().map(str::trim) {
        Some(command) if !command.is_empty() => {
            let upstream = start_upstream(command).await?;
            state = state.with_upstream(Arc::new(upstream));
            info!(command, "MCP session proxy enabled at /mcp");
        }
        _ => warn!("MCP_TOOL_COMMAND not set, /mcp proxy disabled"),
    }

    api::run(&config, state).await?;
    Ok(())
}
