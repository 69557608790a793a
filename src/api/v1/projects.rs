//! Backlog project data handlers.
//!
//! Each theme route returns the same data the matching slide is generated
//! from.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use serde_json::{Value, json};
use tracing::{instrument, warn};

use crate::api::AppState;
use crate::api::system::{ApiResult, ErrorResponse, backlog_token, error};
use crate::generation::{ProjectData, ProjectId};
use crate::mcp::{ToolCall, ToolError};

fn tool_error(err: ToolError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        ToolError::InvalidArguments { .. } | ToolError::UnknownTool { .. } => {
            StatusCode::BAD_REQUEST
        }
        ToolError::NoCredentials => StatusCode::UNAUTHORIZED,
        ToolError::Backlog { status: 404, .. } => StatusCode::NOT_FOUND,
        ToolError::Backlog { status: 401, .. } => StatusCode::UNAUTHORIZED,
        _ => StatusCode::BAD_GATEWAY,
    };
    warn!(error = %err, %status, "Project data request failed");
    error(status, err.to_string())
}

/// List Backlog projects
#[utoipa::path(
    get,
    path = "/api/v1/projects",
    tag = "projects",
    params(("X-Backlog-Token" = Option<String>, Header, description = "Backlog OAuth token")),
    responses(
        (status = 200, description = "Projects visible to the caller", body = serde_json::Value),
        (status = 401, description = "No Backlog credentials", body = ErrorResponse),
        (status = 502, description = "Backlog request failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers))]
pub async fn list_projects(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Value> {
    let call = ToolCall::new("get_project_list", json!({})).with_token(backlog_token(&headers));
    let projects = state
        .orchestrator()
        .tools()
        .call_tool(call)
        .await
        .map_err(tool_error)?;
    Ok(Json(projects))
}

/// Project, space and members
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/overview",
    tag = "projects",
    params(
        ("id" = String, Path, description = "Project ID or key"),
        ("X-Backlog-Token" = Option<String>, Header, description = "Backlog OAuth token")
    ),
    responses(
        (status = 200, description = "Theme data", body = serde_json::Value),
        (status = 401, description = "No Backlog credentials", body = ErrorResponse),
        (status = 404, description = "Unknown project", body = ErrorResponse),
        (status = 502, description = "Backlog request failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers))]
pub async fn get_project_overview(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let project = ProjectId::new(id);
    let token = backlog_token(&headers);
    let data = ProjectData::new(state.orchestrator().tools().as_ref(), &project, token.as_deref());
    data.overview().await.map(Json).map_err(tool_error)
}

/// Issues and issue count
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/progress",
    tag = "projects",
    params(
        ("id" = String, Path, description = "Project ID or key"),
        ("X-Backlog-Token" = Option<String>, Header, description = "Backlog OAuth token")
    ),
    responses(
        (status = 200, description = "Theme data", body = serde_json::Value),
        (status = 401, description = "No Backlog credentials", body = ErrorResponse),
        (status = 404, description = "Unknown project", body = ErrorResponse),
        (status = 502, description = "Backlog request failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers))]
pub async fn get_project_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let project = ProjectId::new(id);
    let token = backlog_token(&headers);
    let data = ProjectData::new(state.orchestrator().tools().as_ref(), &project, token.as_deref());
    data.progress().await.map(Json).map_err(tool_error)
}

/// Recently updated issues with types and priorities
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/issues",
    tag = "projects",
    params(
        ("id" = String, Path, description = "Project ID or key"),
        ("X-Backlog-Token" = Option<String>, Header, description = "Backlog OAuth token")
    ),
    responses(
        (status = 200, description = "Theme data", body = serde_json::Value),
        (status = 401, description = "No Backlog credentials", body = ErrorResponse),
        (status = 404, description = "Unknown project", body = ErrorResponse),
        (status = 502, description = "Backlog request failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers))]
pub async fn get_project_issues(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let project = ProjectId::new(id);
    let token = backlog_token(&headers);
    let data = ProjectData::new(state.orchestrator().tools().as_ref(), &project, token.as_deref());
    data.issues().await.map(Json).map_err(tool_error)
}

/// Members and recent activity
///
/// Falls back to placeholder members when Backlog is unreachable.
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/team",
    tag = "projects",
    params(
        ("id" = String, Path, description = "Project ID or key"),
        ("X-Backlog-Token" = Option<String>, Header, description = "Backlog OAuth token")
    ),
    responses(
        (status = 200, description = "Theme data", body = serde_json::Value)
    )
)]
#[instrument(skip(state, headers))]
pub async fn get_project_team(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let project = ProjectId::new(id);
    let token = backlog_token(&headers);
    let data = ProjectData::new(state.orchestrator().tools().as_ref(), &project, token.as_deref());
    Ok(Json(data.team().await))
}

/// Open high-priority issues
#[utoipa::path(
    get,
    path = "/api/v1/projects/{id}/risks",
    tag = "projects",
    params(
        ("id" = String, Path, description = "Project ID or key"),
        ("X-Backlog-Token" = Option<String>, Header, description = "Backlog OAuth token")
    ),
    responses(
        (status = 200, description = "Theme data", body = serde_json::Value),
        (status = 401, description = "No Backlog credentials", body = ErrorResponse),
        (status = 404, description = "Unknown project", body = ErrorResponse),
        (status = 502, description = "Backlog request failed", body = ErrorResponse)
    )
)]
#[instrument(skip(state, headers))]
pub async fn get_project_risks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    let project = ProjectId::new(id);
    let token = backlog_token(&headers);
    let data = ProjectData::new(state.orchestrator().tools().as_ref(), &project, token.as_deref());
    data.risks().await.map(Json).map_err(tool_error)
}
