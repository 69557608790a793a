use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::{SpeechEngine, SpeechEngineKind, ensure_success, probe};
use crate::providers::error::{ProviderError, ProviderResult};

const NAME: &str = "kokoro";
const DEFAULT_VOICE: &str = "af_heart";

#[derive(Deserialize)]
struct GenerateResponse {
    audio_url: Option<String>,
}

/// Kokoro TTS server: the generate call answers with the URL of a file the
/// server writes, which is then downloaded.
pub struct KokoroEngine {
    client: reqwest::Client,
    base_url: String,
    poll_attempts: u32,
    poll_interval: Duration,
}

impl KokoroEngine {
    pub fn new(base_url: &str) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_attempts: 10,
            poll_interval: Duration::from_millis(500),
        })
    }

    pub fn with_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.poll_attempts = attempts.max(1);
        self.poll_interval = interval;
        self
    }

    /// Kokoro voice ids look like `af_heart`, `jf_alpha`; anything else gets
    /// the default voice.
    pub fn voice_for(voice: &str) -> &str {
        let bytes = voice.as_bytes();
        let is_kokoro_id = bytes.len() > 3
            && bytes[..2].iter().all(u8::is_ascii_lowercase)
            && bytes[2] == b'_';
        if is_kokoro_id { voice } else { DEFAULT_VOICE }
    }

    fn absolute(&self, audio_url: &str) -> String {
        if audio_url.starts_with("http://") || audio_url.starts_with("https://") {
            audio_url.to_string()
        } else {
            format!("{}/{}", self.base_url, audio_url.trim_start_matches('/'))
        }
    }

    async fn download(&self, url: &str) -> ProviderResult<Bytes> {
        for attempt in 1..=self.poll_attempts {
            let response = self.client.get(url).send().await?;
            if response.status() == StatusCode::NOT_FOUND && attempt < self.poll_attempts {
                debug!(attempt, "Kokoro audio not ready yet");
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }
            return Ok(ensure_success(NAME, response).await?.bytes().await?);
        }
        Err(ProviderError::Timeout {
            message: format!("kokoro audio never became available at {url}"),
        })
    }
}

#[async_trait]
impl SpeechEngine for KokoroEngine {
    fn kind(&self) -> SpeechEngineKind {
        SpeechEngineKind::Kokoro
    }

    #[instrument(skip_all, fields(chars = text.chars().count(), language))]
    async fn synthesize(&self, text: &str, language: &str, voice: &str) -> ProviderResult<Bytes> {
        let response = self
            .client
            .post(format!("{}/api/tts", self.base_url))
            .header("accept", "application/json")
            .json(&json!({
                "text": text,
                "language": language,
                "voice": Self::voice_for(voice),
                "format": "wav",
                "speed": 1.0,
            }))
            .send()
            .await?;

        let generated: GenerateResponse = ensure_success(NAME, response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::invalid(NAME, e.to_string()))?;
        let audio_url = generated
            .audio_url
            .ok_or_else(|| ProviderError::invalid(NAME, "audio_url not found in response"))?;

        self.download(&self.absolute(&audio_url)).await
    }

    async fn health(&self) -> ProviderResult<()> {
        probe(&self.client, NAME, format!("{}/health", self.base_url)).await
    }
}
