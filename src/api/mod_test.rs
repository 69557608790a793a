use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use utoipa::OpenApi;

use super::{ApiDoc, AppState, create_router};
use crate::cache::{AudioCache, SpeechService};
use crate::config::AppConfig;
use crate::generation::Orchestrator;
use crate::mcp::MockToolInvoker;
use crate::providers::{SpeechChain, TextChain};

fn test_app() -> (TempDir, axum::Router) {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(AudioCache::new(dir.path()).unwrap());
    let speech = SpeechService::new(cache, SpeechChain::new(Vec::new()));
    let orchestrator = Orchestrator::new(
        Arc::new(MockToolInvoker::new()),
        TextChain::new(Vec::new()),
        speech,
    );
    let app = create_router(AppState::new(orchestrator, AppConfig::default()));
    (dir, app)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_health_reports_ok() {
    let (_dir, app) = test_app();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_docs_are_served() {
    let (_dir, app) = test_app();

    let response = app
        .oneshot(Request::builder().uri("/docs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_openapi_lists_every_route() {
    let doc = serde_json::to_value(ApiDoc::openapi()).unwrap();
    let paths = doc["paths"].as_object().unwrap();

    for path in [
        "/health",
        "/api/v1/slides/generate",
        "/api/v1/slides/{id}/status",
        "/api/v1/slides/{id}",
        "/api/v1/projects",
        "/api/v1/projects/{id}/overview",
        "/api/v1/projects/{id}/progress",
        "/api/v1/projects/{id}/issues",
        "/api/v1/projects/{id}/team",
        "/api/v1/projects/{id}/risks",
        "/api/v1/speech/synthesize",
        "/api/v1/speech/engines",
        "/mcp",
    ] {
        assert!(paths.contains_key(path), "missing {path}");
    }
    assert!(paths["/mcp"]["post"].is_object());
    assert!(paths["/mcp"]["delete"].is_object());
    assert!(paths["/mcp"]["post"]["requestBody"]["content"]["application/json"].is_object());
}
