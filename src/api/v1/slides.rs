//! Presentation generation handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::api::AppState;
use crate::api::system::{ApiResult, ErrorResponse, backlog_token, error};
use crate::generation::{
    GenerationError, GenerationRequest, PresentationSnapshot, PresentationStatus, ProjectId,
    SlideTheme,
};

const DEFAULT_LANGUAGE: &str = "ja";

// =============================================================================
// DTOs
// =============================================================================

/// Generate slides request DTO
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSlidesRequest {
    /// Backlog project ID or key
    #[schema(value_type = Option<String>, example = "12345")]
    pub project_id: Option<ProjectId>,
    /// Slide themes, one slide each, in order
    #[schema(value_type = Vec<String>, example = json!(["project_overview", "risk_analysis"]))]
    #[serde(default)]
    pub themes: Vec<SlideTheme>,
    /// Presentation language
    #[schema(example = "ja")]
    pub language: Option<String>,
}

/// Generate slides response DTO
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSlidesResponse {
    #[schema(example = "6f1c2e0a-8d1b-4a57-9d0e-3b7f2f9a1c44")]
    pub slide_id: String,
    pub status: PresentationStatus,
    /// Where to stream generation events from
    #[schema(example = "ws://localhost:8080/ws/slides/6f1c2e0a-8d1b-4a57-9d0e-3b7f2f9a1c44")]
    pub websocket_url: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Start generating a presentation
///
/// Returns immediately; progress is streamed over the WebSocket URL.
#[utoipa::path(
    post,
    path = "/api/v1/slides/generate",
    tag = "slides",
    request_body = GenerateSlidesRequest,
    params(("X-Backlog-Token" = Option<String>, Header, description = "Backlog OAuth token")),
    responses(
        (status = 200, description = "Generation started", body = GenerateSlidesResponse),
        (status = 400, description = "Missing project or themes", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers))]
pub async fn generate_slides(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<GenerateSlidesRequest>,
) -> ApiResult<GenerateSlidesResponse> {
    let project_id = req
        .project_id
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "projectId is required"))?;
    let language = req
        .language
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

    let session = state
        .orchestrator()
        .start(GenerationRequest {
            project_id,
            themes: req.themes,
            language,
            access_token: backlog_token(&headers),
        })
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))?;

    info!(slide_id = %session.id(), themes = session.themes().len(), "Slide generation requested");

    Ok(Json(GenerateSlidesResponse {
        slide_id: session.id().to_string(),
        status: PresentationStatus::Generating,
        websocket_url: state.config().websocket_url(session.id()),
    }))
}

/// Get presentation status
///
/// Everything generated so far, with the stage of each theme.
#[utoipa::path(
    get,
    path = "/api/v1/slides/{id}/status",
    tag = "slides",
    params(("id" = String, Path, description = "Presentation ID")),
    responses(
        (status = 200, description = "Current state", body = PresentationSnapshot),
        (status = 404, description = "Unknown presentation", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_slide_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PresentationSnapshot> {
    let session = state
        .orchestrator()
        .session(&id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("Presentation not found: {id}")))?;
    Ok(Json(session.snapshot().await))
}

/// Cancel a running presentation
#[utoipa::path(
    delete,
    path = "/api/v1/slides/{id}",
    tag = "slides",
    params(("id" = String, Path, description = "Presentation ID")),
    responses(
        (status = 200, description = "Final state", body = PresentationSnapshot),
        (status = 404, description = "Unknown presentation", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn cancel_slides(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<PresentationSnapshot> {
    match state.orchestrator().cancel(&id).await {
        Ok(()) => {}
        Err(e @ GenerationError::NotFound { .. }) => {
            return Err(error(StatusCode::NOT_FOUND, e.to_string()));
        }
        Err(e) => return Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
    let session = state
        .orchestrator()
        .session(&id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, format!("Presentation not found: {id}")))?;
    Ok(Json(session.snapshot().await))
}
