//! `/mcp` session proxy onto the child tool server.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{Instrument, info, info_span, warn};

use super::state::AppState;
use super::system::{ErrorResponse, error};
use crate::mcp::{McpRequest, StdioUpstream};
use crate::mcp::bridge::{SESSION_HEADER, session_id, with_session};

/// Forward a JSON-RPC envelope
///
/// The response carries the caller's request id and the session header.
#[utoipa::path(
    post,
    path = "/mcp",
    tag = "mcp",
    request_body(content = serde_json::Value, description = "JSON-RPC request or notification"),
    params(("Mcp-Session-Id" = Option<String>, Header, description = "Session to route the call through")),
    responses(
        (status = 200, description = "JSON-RPC response", body = serde_json::Value),
        (status = 202, description = "Notification accepted"),
        (status = 400, description = "Malformed envelope", body = ErrorResponse),
        (status = 500, description = "Upstream failure", body = ErrorResponse)
    )
)]
pub async fn proxy_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<McpRequest>, JsonRejection>,
) -> Response {
    let session = session_id(&headers);
    let response = match (state.upstream(), body) {
        (None, _) => error(StatusCode::SERVICE_UNAVAILABLE, "No tool server configured").into_response(),
        (_, Err(rejection)) => error(StatusCode::BAD_REQUEST, rejection.body_text()).into_response(),
        (Some(upstream), Ok(Json(request))) => {
            let span = info_span!("mcp_proxy", session = %session, method = %request.method);
            forward(upstream, &session, request).instrument(span).await
        }
    };
    with_session(&session, response)
}

async fn forward(upstream: &StdioUpstream, session: &str, request: McpRequest) -> Response {
    let McpRequest {
        id, method, params, ..
    } = request;

    if id.is_none() {
        return match upstream.notify(&method, params).await {
            Ok(()) => StatusCode::ACCEPTED.into_response(),
            Err(e) => {
                warn!(error = %e, "Notification forward failed");
                error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
            }
        };
    }

    match upstream.request(session, &method, params).await {
        Ok(mut reply) => {
            reply.id = id;
            Json(reply).into_response()
        }
        Err(e) => {
            warn!(error = %e, "Upstream call failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Close a session
///
/// Pending calls of the session fail immediately.
#[utoipa::path(
    delete,
    path = "/mcp",
    tag = "mcp",
    params(("Mcp-Session-Id" = String, Header, description = "Session to close")),
    responses(
        (status = 200, description = "Session closed", body = serde_json::Value),
        (status = 400, description = "Missing session header", body = ErrorResponse)
    )
)]
pub async fn close_session(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session) = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    else {
        return error(StatusCode::BAD_REQUEST, "Missing session ID").into_response();
    };

    let cancelled = state
        .upstream()
        .map(|upstream| upstream.close_session(session))
        .unwrap_or_default();
    info!(session, cancelled, "MCP session closed");
    Json(json!({"status": "closed"})).into_response()
}
