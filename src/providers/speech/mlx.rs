use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::json;
use tracing::instrument;

use super::{SpeechEngine, SpeechEngineKind, ensure_success, is_male, probe};
use crate::providers::error::ProviderResult;

const NAME: &str = "mlx-audio";

/// MLX-Audio server: one POST returns the WAV body.
pub struct MlxAudioEngine {
    client: reqwest::Client,
    base_url: String,
}

impl MlxAudioEngine {
    pub fn new(base_url: &str) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SpeechEngine for MlxAudioEngine {
    fn kind(&self) -> SpeechEngineKind {
        SpeechEngineKind::MlxAudio
    }

    #[instrument(skip_all, fields(chars = text.chars().count()))]
    async fn synthesize(&self, text: &str, language: &str, voice: &str) -> ProviderResult<Bytes> {
        let voice = if is_male(voice) { "male" } else { "female" };

        let response = self
            .client
            .post(format!("{}/api/tts", self.base_url))
            .header("accept", "audio/wav")
            .json(&json!({
                "text": text,
                "language": language,
                "voice": voice,
                "format": "wav",
                "speed": 1.0,
            }))
            .send()
            .await?;

        Ok(ensure_success(NAME, response).await?.bytes().await?)
    }

    async fn health(&self) -> ProviderResult<()> {
        probe(&self.client, NAME, format!("{}/health", self.base_url)).await
    }
}
