//! Speech synthesis engines and the language-aware fallback chain.
//!
//! Japanese text is offered to every engine, preferred engine first.
//! The other supported languages only go to Kokoro, the one multilingual
//! engine.

mod kokoro;
mod mlx;
mod voicevox;


use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};
use utoipa::ToSchema;

pub use kokoro::KokoroEngine;
pub use mlx::MlxAudioEngine;
pub use voicevox::VoicevoxEngine;

use super::error::{ProviderError, ProviderResult};

/// Languages Kokoro can speak besides Japanese.
pub const MULTILINGUAL_LANGUAGES: &[&str] = &["en", "es", "fr", "hi", "it", "pt", "zh"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechEngineKind {
    #[default]
    Voicevox,
    Kokoro,
    MlxAudio,
}

impl SpeechEngineKind {
    const DEFAULT_ORDER: [SpeechEngineKind; 3] = [
        SpeechEngineKind::Voicevox,
        SpeechEngineKind::Kokoro,
        SpeechEngineKind::MlxAudio,
    ];

    pub fn supports(self, language: &str) -> bool {
        match self {
            SpeechEngineKind::Kokoro => {
                language == "ja" || MULTILINGUAL_LANGUAGES.contains(&language)
            }
            SpeechEngineKind::Voicevox | SpeechEngineKind::MlxAudio => language == "ja",
        }
    }
}

impl FromStr for SpeechEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "voicevox" => Ok(SpeechEngineKind::Voicevox),
            "kokoro" => Ok(SpeechEngineKind::Kokoro),
            "mlx" | "mlx-audio" | "mlx_audio" => Ok(SpeechEngineKind::MlxAudio),
            other => Err(format!(
                "unknown TTS engine '{other}' (expected voicevox, kokoro or mlx-audio)"
            )),
        }
    }
}

impl fmt::Display for SpeechEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpeechEngineKind::Voicevox => write!(f, "voicevox"),
            SpeechEngineKind::Kokoro => write!(f, "kokoro"),
            SpeechEngineKind::MlxAudio => write!(f, "mlx-audio"),
        }
    }
}

/// A text-to-speech backend producing WAV bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    fn kind(&self) -> SpeechEngineKind;

    async fn synthesize(&self, text: &str, language: &str, voice: &str) -> ProviderResult<Bytes>;

    /// Cheap liveness probe.
    async fn health(&self) -> ProviderResult<()>;
}

/// Engine endpoints.
#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub preferred: SpeechEngineKind,
    pub voicevox_url: String,
    pub kokoro_url: String,
    pub mlx_audio_url: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            preferred: SpeechEngineKind::Voicevox,
            voicevox_url: "http://localhost:50021".to_string(),
            kokoro_url: "http://localhost:8882".to_string(),
            mlx_audio_url: "http://localhost:8881".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EngineHealth {
    pub engine: SpeechEngineKind,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Engines tried in order until one returns non-empty audio.
#[derive(Clone)]
pub struct SpeechChain {
    engines: Arc<[Arc<dyn SpeechEngine>]>,
}

impl SpeechChain {
    /// Engines are kept in the given order.
    pub fn new(engines: Vec<Arc<dyn SpeechEngine>>) -> Self {
        Self {
            engines: engines.into(),
        }
    }

    /// Build all three engines, preferred one first, the rest in default order.
    pub fn from_settings(settings: &SpeechSettings) -> ProviderResult<Self> {
        let mut order = vec![settings.preferred];
        order.extend(
            SpeechEngineKind::DEFAULT_ORDER
                .into_iter()
                .filter(|kind| *kind != settings.preferred),
        );

        let mut engines: Vec<Arc<dyn SpeechEngine>> = Vec::with_capacity(order.len());
        for kind in order {
            let engine: Arc<dyn SpeechEngine> = match kind {
                SpeechEngineKind::Voicevox => Arc::new(VoicevoxEngine::new(&settings.voicevox_url)?),
                SpeechEngineKind::Kokoro => Arc::new(KokoroEngine::new(&settings.kokoro_url)?),
                SpeechEngineKind::MlxAudio => {
                    Arc::new(MlxAudioEngine::new(&settings.mlx_audio_url)?)
                }
            };
            engines.push(engine);
        }
        Ok(Self::new(engines))
    }

    pub fn engine_kinds(&self) -> Vec<SpeechEngineKind> {
        self.engines.iter().map(|e| e.kind()).collect()
    }

    /// Engines that will be tried for `language`, in order.
    pub fn order_for(&self, language: &str) -> ProviderResult<Vec<Arc<dyn SpeechEngine>>> {
        let engines: Vec<_> = self
            .engines
            .iter()
            .filter(|e| e.kind().supports(language))
            .cloned()
            .collect();

        if engines.is_empty() {
            let known = language == "ja" || MULTILINGUAL_LANGUAGES.contains(&language);
            return Err(if known {
                ProviderError::NotConfigured { kind: "speech" }
            } else {
                ProviderError::UnsupportedLanguage {
                    language: language.to_string(),
                }
            });
        }
        Ok(engines)
    }

    pub async fn synthesize(&self, text: &str, language: &str, voice: &str) -> ProviderResult<Bytes> {
        let mut last_error = None;

        for engine in self.order_for(language)? {
            debug!(engine = %engine.kind(), language, "Synthesizing speech");
            match engine.synthesize(text, language, voice).await {
                Ok(audio) if !audio.is_empty() => return Ok(audio),
                Ok(_) => {
                    warn!(engine = %engine.kind(), "Speech engine returned empty audio, trying next");
                    last_error = Some(ProviderError::invalid(
                        &engine.kind().to_string(),
                        "audio is empty",
                    ));
                }
                Err(e) => {
                    warn!(engine = %engine.kind(), error = %e, "Speech engine failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::NotConfigured { kind: "speech" }))
    }

    /// Probe every engine.
    pub async fn health(&self) -> Vec<EngineHealth> {
        let mut report = Vec::with_capacity(self.engines.len());
        for engine in self.engines.iter() {
            let result = engine.health().await;
            report.push(EngineHealth {
                engine: engine.kind(),
                available: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
            });
        }
        report
    }
}

impl fmt::Debug for SpeechChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechChain")
            .field("engines", &self.engine_kinds())
            .finish()
    }
}

/// Shared GET-based health probe.
async fn probe(client: &reqwest::Client, provider: &str, url: String) -> ProviderResult<()> {
    let response = client
        .get(url)
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await?;
    if response.status().is_success() {
        Ok(())
    } else {
        Err(ProviderError::api(
            provider,
            response.status().as_u16(),
            "health check failed",
        ))
    }
}

/// Turn a non-2xx response into an API error carrying the body text.
async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> ProviderResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::api(provider, status.as_u16(), body))
}

fn is_male(voice: &str) -> bool {
    voice.to_ascii_lowercase().contains("male") && !voice.to_ascii_lowercase().contains("female")
}
