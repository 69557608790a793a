//! Service configuration read from the environment.
//!
//! Precedence is CLI flag > environment variable > default; the binaries
//! apply their flags on top of [`AppConfig::from_env`] with the `with_*`
//! builders.

use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use miette::Diagnostic;
use thiserror::Error;

use crate::cache::AudioCache;
use crate::providers::sigv4::Credentials;
use crate::providers::text::{DEFAULT_BEDROCK_MODEL, DEFAULT_BEDROCK_REGION};
use crate::providers::{SpeechEngineKind, SpeechSettings, TextProviderKind, TextSettings};

pub const DEFAULT_API_PORT: u16 = 8080;
pub const DEFAULT_TOOLS_PORT: u16 = 3001;
pub const DEFAULT_MCP_BACKLOG_URL: &str = "http://localhost:3001";
pub const DEFAULT_AUDIO_CACHE_DIR: &str = "./cache/audio";

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}' ({message})")]
    #[diagnostic(code(presenter::config::invalid_value))]
    InvalidValue {
        name: &'static str,
        value: String,
        message: String,
    },
}

/// Backlog connection settings for the tool gateway.
#[derive(Debug, Clone, Default)]
pub struct BacklogSettings {
    pub domain: Option<String>,
    pub access_token: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: IpAddr,
    pub port: u16,
    /// Base of the WebSocket URLs handed to clients, e.g. `ws://localhost:8080`.
    pub public_url: Option<String>,
    pub text: TextSettings,
    pub speech: SpeechSettings,
    pub mcp_backlog_url: String,
    pub mcp_tool_command: Option<String>,
    pub audio_cache_dir: PathBuf,
    /// Prefix of the clip URLs in slide audio. Served by a static file
    /// server in front of `audio_cache_dir`, not by this process.
    pub audio_url_prefix: String,
    pub backlog: BacklogSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_API_PORT,
            public_url: None,
            text: TextSettings {
                aws_region: DEFAULT_BEDROCK_REGION.to_string(),
                bedrock_model: DEFAULT_BEDROCK_MODEL.to_string(),
                ..TextSettings::default()
            },
            speech: SpeechSettings::default(),
            mcp_backlog_url: DEFAULT_MCP_BACKLOG_URL.to_string(),
            mcp_tool_command: None,
            audio_cache_dir: PathBuf::from(DEFAULT_AUDIO_CACHE_DIR),
            audio_url_prefix: AudioCache::DEFAULT_URL_PREFIX.to_string(),
            backlog: BacklogSettings::default(),
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        name,
        message: e.to_string(),
        value,
    })
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = var("HOST") {
            config.host = parse("HOST", host)?;
        }
        if let Some(port) = var("PORT") {
            config.port = parse("PORT", port)?;
        }
        config.public_url = var("PUBLIC_URL");

        if let Some(provider) = var("AI_PROVIDER") {
            config.text.preferred = parse::<TextProviderKind>("AI_PROVIDER", provider)?;
        }
        config.text.openai_api_key = var("OPENAI_API_KEY");
        if let Some(region) = var("AWS_REGION") {
            config.text.aws_region = region;
        }
        if let Some(model) = var("BEDROCK_MODEL_ID") {
            config.text.bedrock_model = model;
        }
        if let (Some(access_key_id), Some(secret_access_key)) =
            (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY"))
        {
            config.text.aws_credentials = Some(Credentials {
                access_key_id,
                secret_access_key,
                session_token: var("AWS_SESSION_TOKEN"),
            });
        }

        if let Some(engine) = var("TTS_ENGINE") {
            config.speech.preferred = parse::<SpeechEngineKind>("TTS_ENGINE", engine)?;
        }
        if let Some(url) = var("VOICEVOX_ENGINE_URL") {
            config.speech.voicevox_url = url;
        }
        if let Some(url) = var("KOKORO_TTS_URL") {
            config.speech.kokoro_url = url;
        }
        if let Some(url) = var("MLX_AUDIO_URL") {
            config.speech.mlx_audio_url = url;
        }

        if let Some(url) = var("MCP_BACKLOG_URL") {
            config.mcp_backlog_url = url;
        }
        config.mcp_tool_command = var("MCP_TOOL_COMMAND");
        if let Some(dir) = var("AUDIO_CACHE_DIR") {
            config.audio_cache_dir = PathBuf::from(dir);
        }
        if let Some(prefix) = var("AUDIO_URL_PREFIX") {
            config.audio_url_prefix = prefix;
        }

        config.backlog = BacklogSettings {
            domain: var("BACKLOG_DOMAIN"),
            access_token: var("BACKLOG_ACCESS_TOKEN"),
            api_key: var("BACKLOG_API_KEY"),
        };

        Ok(config)
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_audio_cache_dir(mut self, dir: PathBuf) -> Self {
        self.audio_cache_dir = dir;
        self
    }

    pub fn with_tool_command(mut self, command: Option<String>) -> Self {
        if command.is_some() {
            self.mcp_tool_command = command;
        }
        self
    }

    /// `{base}/ws/slides/{id}`, defaulting the base to `ws://localhost:{port}`.
    pub fn websocket_url(&self, presentation_id: &str) -> String {
        let base = self
            .public_url
            .clone()
            .unwrap_or_else(|| format!("ws://localhost:{}", self.port));
        format!("{}/ws/slides/{presentation_id}", base.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env;

    use serial_test::serial;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.text.preferred, TextProviderKind::OpenAi);
        assert_eq!(config.text.aws_region, "ap-northeast-1");
        assert!(config.text.aws_credentials.is_none());
        assert_eq!(config.speech.preferred, SpeechEngineKind::Voicevox);
        assert_eq!(config.mcp_backlog_url, "http://localhost:3001");
        assert!(config.mcp_tool_command.is_none());
        assert_eq!(config.audio_cache_dir, PathBuf::from("./cache/audio"));
        assert_eq!(config.audio_url_prefix, "/cache");
        assert_eq!(
            config.websocket_url("abc"),
            "ws://localhost:8080/ws/slides/abc"
        );
    }

    #[test]
    fn test_aws_credentials_need_both_keys() {
        let half = AppConfig::from_lookup(lookup(&[("AWS_ACCESS_KEY_ID", "AKID")])).unwrap();
        assert!(half.text.aws_credentials.is_none());

        let full = AppConfig::from_lookup(lookup(&[
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("AWS_SESSION_TOKEN", ""),
        ]))
        .unwrap();
        let credentials = full.text.aws_credentials.unwrap();
        assert_eq!(credentials.access_key_id, "AKID");
        assert!(credentials.session_token.is_none());
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = AppConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));

        let err = AppConfig::from_lookup(lookup(&[("TTS_ENGINE", "espeak")])).unwrap_err();
        assert!(err.to_string().contains("espeak"));
    }

    #[test]
    fn test_audio_url_prefix_from_env() {
        let config = AppConfig::from_lookup(lookup(&[
            ("AUDIO_URL_PREFIX", "https://cdn.example.com/audio"),
            ("AUDIO_CACHE_DIR", "/var/lib/presenter/audio"),
        ]))
        .unwrap();

        assert_eq!(config.audio_url_prefix, "https://cdn.example.com/audio");
        assert_eq!(config.audio_cache_dir, PathBuf::from("/var/lib/presenter/audio"));
    }

    #[test]
    fn test_public_url_overrides_websocket_base() {
        let config =
            AppConfig::from_lookup(lookup(&[("PUBLIC_URL", "wss://slides.example.com/")])).unwrap();
        assert_eq!(
            config.websocket_url("p1"),
            "wss://slides.example.com/ws/slides/p1"
        );
    }

    #[test]
    #[serial]
    fn test_from_env_reads_process_environment() {
        unsafe {
            env::set_var("AI_PROVIDER", "bedrock");
            env::set_var("TTS_ENGINE", "kokoro");
        }

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.text.preferred, TextProviderKind::Bedrock);
        assert_eq!(config.speech.preferred, SpeechEngineKind::Kokoro);

        unsafe {
            env::remove_var("AI_PROVIDER");
            env::remove_var("TTS_ENGINE");
        }
    }

    #[test]
    #[serial]
    fn test_cli_flags_override_env() {
        unsafe {
            env::set_var("PORT", "9000");
            env::set_var("MCP_TOOL_COMMAND", "presenter-tools --stdio");
        }

        let config = AppConfig::from_env()
            .unwrap()
            .with_port(7000)
            .with_tool_command(None);
        assert_eq!(config.port, 7000);
        assert_eq!(
            config.mcp_tool_command.as_deref(),
            Some("presenter-tools --stdio")
        );

        unsafe {
            env::remove_var("PORT");
            env::remove_var("MCP_TOOL_COMMAND");
        }
    }
}
