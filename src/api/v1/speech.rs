//! Speech synthesis handlers.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::system::{ApiResult, ErrorResponse, error};
use crate::cache::SpeechError;
use crate::providers::ProviderError;
use crate::providers::speech::EngineHealth;

// =============================================================================
// DTOs
// =============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct SynthesizeRequest {
    #[schema(example = "本日の進捗をご報告します。")]
    pub text: String,
    #[schema(example = "ja")]
    pub language: Option<String>,
    /// Engine-specific voice selector
    #[schema(example = "female")]
    pub voice: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeResponse {
    #[schema(example = "/cache/3f1a9c.wav")]
    pub audio_url: String,
    /// True when served from the audio cache
    pub cached: bool,
    /// Estimated length in seconds
    #[schema(example = 12)]
    pub duration: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EnginesResponse {
    pub engines: Vec<EngineHealth>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Synthesize speech
///
/// Served from the cache when the same text, language and voice were
/// synthesized before.
#[utoipa::path(
    post,
    path = "/api/v1/speech/synthesize",
    tag = "speech",
    request_body = SynthesizeRequest,
    responses(
        (status = 200, description = "Audio available", body = SynthesizeResponse),
        (status = 400, description = "Empty text or unsupported language", body = ErrorResponse),
        (status = 502, description = "Every speech engine failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, req))]
pub async fn synthesize(
    State(state): State<AppState>,
    Json(req): Json<SynthesizeRequest>,
) -> ApiResult<SynthesizeResponse> {
    if req.text.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "text is required"));
    }
    let language = req.language.unwrap_or_else(|| "ja".to_string());
    let voice = req.voice.unwrap_or_default();

    let result = state
        .orchestrator()
        .speech()
        .synthesize(&req.text, &language, &voice)
        .await
        .map_err(|e| {
            let status = match &e {
                SpeechError::Provider(ProviderError::UnsupportedLanguage { .. }) => {
                    StatusCode::BAD_REQUEST
                }
                SpeechError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
                SpeechError::Provider(_) => StatusCode::BAD_GATEWAY,
            };
            error(status, e.to_string())
        })?;

    Ok(Json(SynthesizeResponse {
        audio_url: result.audio.url,
        cached: result.cache_hit,
        duration: result.duration_secs,
    }))
}

/// Speech engine health
#[utoipa::path(
    get,
    path = "/api/v1/speech/engines",
    tag = "speech",
    responses((status = 200, description = "Availability of each engine", body = EnginesResponse))
)]
#[instrument(skip(state))]
pub async fn list_engines(State(state): State<AppState>) -> Json<EnginesResponse> {
    let engines = state.orchestrator().speech().chain().health().await;
    Json(EnginesResponse { engines })
}
