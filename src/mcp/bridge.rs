//! HTTP front for the tool engine, served by `presenter-tools`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, info_span};

use super::engine::McpEngine;
use super::protocol::{JsonRpcError, McpRequest};
use super::registry::ToolContext;

pub const SESSION_HEADER: &str = "mcp-session-id";

#[derive(Debug, Deserialize)]
pub struct BridgeCall {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,
}

pub fn router(engine: Arc<McpEngine>) -> Router {
    Router::new()
        .route("/mcp/call", post(call_tool))
        .route("/mcp", post(rpc))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

/// Session id from the request, or a fresh one.
pub fn session_id(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

/// Echo the session id on the response.
pub fn with_session(session: &str, mut response: Response) -> Response {
    if let Ok(value) = HeaderValue::from_str(session) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    response
}

async fn call_tool(
    State(engine): State<Arc<McpEngine>>,
    headers: HeaderMap,
    body: Result<Json<BridgeCall>, JsonRejection>,
) -> Response {
    let session = session_id(&headers);
    let Json(call) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return with_session(
                &session,
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": rejection.body_text() })),
                )
                    .into_response(),
            );
        }
    };

    let span = info_span!("bridge_call", session = %session, tool = %call.tool);
    let ctx = ToolContext::with_token(call.access_token);
    let outcome = engine
        .call_tool(&call.tool, call.args, &ctx)
        .instrument(span)
        .await;

    let response = match outcome {
        Ok(result) => (StatusCode::OK, Json(json!({ "result": result }))).into_response(),
        Err(err) => {
            let err = JsonRpcError::from(err);
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.message, "code": err.code })),
            )
                .into_response()
        }
    };
    with_session(&session, response)
}

async fn rpc(
    State(engine): State<Arc<McpEngine>>,
    headers: HeaderMap,
    body: Result<Json<McpRequest>, JsonRejection>,
) -> Response {
    let session = session_id(&headers);
    let response = match body {
        Ok(Json(request)) => match engine.handle(request).await {
            Some(reply) => Json(reply).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        },
        Err(rejection) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": rejection.body_text() })),
        )
            .into_response(),
    };
    with_session(&session, response)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
