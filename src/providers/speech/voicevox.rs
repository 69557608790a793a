use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::instrument;

use super::{SpeechEngine, SpeechEngineKind, ensure_success, is_male, probe};
use crate::providers::error::{ProviderError, ProviderResult};

const NAME: &str = "voicevox";
const DEFAULT_SPEAKER: &str = "3";
const MALE_SPEAKER: &str = "2";

/// VOICEVOX engine: `audio_query` builds a synthesis plan, `synthesis`
/// renders it.
pub struct VoicevoxEngine {
    client: reqwest::Client,
    base_url: String,
}

impl VoicevoxEngine {
    pub fn new(base_url: &str) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn speaker_for(voice: &str) -> &'static str {
        if is_male(voice) { MALE_SPEAKER } else { DEFAULT_SPEAKER }
    }
}

#[async_trait]
impl SpeechEngine for VoicevoxEngine {
    fn kind(&self) -> SpeechEngineKind {
        SpeechEngineKind::Voicevox
    }

    #[instrument(skip_all, fields(chars = text.chars().count()))]
    async fn synthesize(&self, text: &str, _language: &str, voice: &str) -> ProviderResult<Bytes> {
        let speaker = Self::speaker_for(voice);

        let query = self
            .client
            .post(format!("{}/audio_query", self.base_url))
            .query(&[("text", text), ("speaker", speaker)])
            .send()
            .await?;
        let query = ensure_success(NAME, query).await?.bytes().await?;

        // The plan is opaque to us, but it must at least be JSON.
        serde_json::from_slice::<serde_json::Value>(&query)
            .map_err(|e| ProviderError::invalid(NAME, format!("audio_query is not JSON: {e}")))?;

        let audio = self
            .client
            .post(format!("{}/synthesis", self.base_url))
            .query(&[("speaker", speaker)])
            .header("content-type", "application/json")
            .header("accept", "audio/wav")
            .body(query)
            .send()
            .await?;

        Ok(ensure_success(NAME, audio).await?.bytes().await?)
    }

    async fn health(&self) -> ProviderResult<()> {
        probe(&self.client, NAME, format!("{}/docs", self.base_url)).await
    }
}
