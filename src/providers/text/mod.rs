//! Text generation providers and the ordered fallback chain over them.

mod bedrock;
mod openai;


use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

pub use bedrock::{BedrockProvider, DEFAULT_BEDROCK_MODEL, DEFAULT_BEDROCK_REGION};
pub use openai::{DEFAULT_OPENAI_MODEL, OpenAiProvider};

use super::error::{ProviderError, ProviderResult};
use super::sigv4::Credentials;

/// A backend turning a prompt into text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Stable identifier used in logs.
    fn name(&self) -> &'static str;

    async fn generate(&self, prompt: &str) -> ProviderResult<String>;
}

/// Which text backend goes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextProviderKind {
    #[default]
    OpenAi,
    Bedrock,
}

impl FromStr for TextProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(TextProviderKind::OpenAi),
            "bedrock" => Ok(TextProviderKind::Bedrock),
            other => Err(format!("unknown AI provider '{other}' (expected openai or bedrock)")),
        }
    }
}

impl fmt::Display for TextProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextProviderKind::OpenAi => write!(f, "openai"),
            TextProviderKind::Bedrock => write!(f, "bedrock"),
        }
    }
}

/// Settings for building the text chain.
#[derive(Debug, Clone, Default)]
pub struct TextSettings {
    pub preferred: TextProviderKind,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub aws_credentials: Option<Credentials>,
    pub aws_region: String,
    pub bedrock_model: String,
    pub bedrock_endpoint: Option<String>,
}

/// Ordered list of text providers tried until one succeeds.
///
/// Built once at startup and shared behind an `Arc`; the order never changes
/// afterwards.
#[derive(Clone)]
pub struct TextChain {
    providers: Arc<[Arc<dyn TextProvider>]>,
}

impl TextChain {
    pub fn new(providers: Vec<Arc<dyn TextProvider>>) -> Self {
        Self {
            providers: providers.into(),
        }
    }

    /// Build the chain from settings.
    ///
    /// The preferred provider goes first; providers without credentials are
    /// left out.
    pub fn from_settings(settings: &TextSettings) -> ProviderResult<Self> {
        let mut openai: Option<Arc<dyn TextProvider>> = None;
        if let Some(key) = settings.openai_api_key.as_deref().filter(|k| !k.is_empty()) {
            let mut provider = OpenAiProvider::new(key)?;
            if let Some(url) = &settings.openai_base_url {
                provider = provider.with_base_url(url);
            }
            openai = Some(Arc::new(provider));
        }

        let mut bedrock: Option<Arc<dyn TextProvider>> = None;
        if let Some(credentials) = &settings.aws_credentials {
            let mut provider = BedrockProvider::new(
                credentials.clone(),
                &settings.aws_region,
                &settings.bedrock_model,
            )?;
            if let Some(endpoint) = &settings.bedrock_endpoint {
                provider = provider.with_endpoint(endpoint);
            }
            bedrock = Some(Arc::new(provider));
        }

        let ordered = match settings.preferred {
            TextProviderKind::Bedrock => [bedrock, openai],
            TextProviderKind::OpenAi => [openai, bedrock],
        };

        Ok(Self::new(ordered.into_iter().flatten().collect()))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Try each provider in order and return the first success.
    ///
    /// Exhausting the chain returns the last provider's error.
    pub async fn generate(&self, prompt: &str) -> ProviderResult<String> {
        let mut last_error = None;

        for provider in self.providers.iter() {
            debug!(provider = provider.name(), "Generating text");
            match provider.generate(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(provider = provider.name(), error = %e, "Text provider failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::NotConfigured { kind: "text" }))
    }
}

impl fmt::Debug for TextChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextChain")
            .field("providers", &self.provider_names())
            .finish()
    }
}
