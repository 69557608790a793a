use std::sync::Arc;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use super::{AudioCache, AudioRef, CacheError};
use crate::providers::{ProviderError, SpeechChain};

const WORDS_PER_MINUTE: f64 = 150.0;

#[derive(Error, Diagnostic, Debug)]
pub enum SpeechError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechResult {
    pub audio: AudioRef,
    pub cache_hit: bool,
    pub duration_secs: u32,
}

/// Cache-first speech synthesis.
///
/// Safe to share between presentations: the cache is keyed by content and the
/// chain holds no per-call state. Two concurrent misses on the same key both
/// synthesize; the first file written is kept.
#[derive(Clone)]
pub struct SpeechService {
    cache: Arc<AudioCache>,
    chain: SpeechChain,
}

impl SpeechService {
    pub fn new(cache: Arc<AudioCache>, chain: SpeechChain) -> Self {
        Self { cache, chain }
    }

    pub fn cache(&self) -> &AudioCache {
        &self.cache
    }

    pub fn chain(&self) -> &SpeechChain {
        &self.chain
    }

    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    pub async fn synthesize(
        &self,
        text: &str,
        language: &str,
        voice: &str,
    ) -> Result<SpeechResult, SpeechError> {
        let duration_secs = estimate_duration_secs(text, language);

        if let Some(audio) = self.cache.get(text, language, voice).await {
            debug!(key = %audio.key, "Speech served from cache");
            return Ok(SpeechResult {
                audio,
                cache_hit: true,
                duration_secs,
            });
        }

        let data = self.chain.synthesize(text, language, voice).await?;
        let audio = self.cache.put(text, language, voice, &data).await?;
        info!(key = %audio.key, bytes = data.len(), "Speech synthesized");

        Ok(SpeechResult {
            audio,
            cache_hit: false,
            duration_secs,
        })
    }
}

/// Rough spoken length at 150 words per minute, never below one second.
///
/// Japanese has no word separators, so three characters count as a word.
pub fn estimate_duration_secs(text: &str, language: &str) -> u32 {
    let words = if language == "ja" {
        text.chars().filter(|c| !c.is_whitespace()).count() / 3
    } else {
        text.split_whitespace().count()
    }
    .max(1);

    let seconds = (words as f64 / WORDS_PER_MINUTE * 60.0).ceil() as u32;
    seconds.max(1)
}
