//! Integration tests for project data endpoints.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use crate::api::{AppState, create_router};
use crate::cache::{AudioCache, SpeechService};
use crate::config::AppConfig;
use crate::generation::Orchestrator;
use crate::mcp::{MockToolInvoker, ToolError};
use crate::providers::{SpeechChain, TextChain};

/// Create a test app around the given tool mock
fn test_app(tools: MockToolInvoker) -> (TempDir, axum::Router) {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(AudioCache::new(dir.path()).unwrap());
    let speech = SpeechService::new(cache, SpeechChain::new(Vec::new()));
    let orchestrator = Orchestrator::new(Arc::new(tools), TextChain::new(Vec::new()), speech);
    let app = create_router(AppState::new(orchestrator, AppConfig::default()));
    (dir, app)
}

/// Helper to parse JSON response body
async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

// =============================================================================
// GET /api/v1/projects
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn list_projects_returns_tool_payload() {
    let mut tools = MockToolInvoker::new();
    tools
        .expect_call_tool()
        .withf(|call| call.name == "get_project_list" && call.access_token.is_none())
        .times(1)
        .returning(|_| Ok(json!([{"id": 1, "projectKey": "DEMO"}])));
    let (_dir, app) = test_app(tools);

    let response = app.oneshot(get("/api/v1/projects")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body[0]["projectKey"], "DEMO");
}

#[tokio::test(flavor = "multi_thread")]
async fn list_projects_forwards_backlog_token() {
    let mut tools = MockToolInvoker::new();
    tools
        .expect_call_tool()
        .withf(|call| call.access_token.as_deref() == Some("oauth-123"))
        .times(1)
        .returning(|_| Ok(json!([])));
    let (_dir, app) = test_app(tools);

    let request = Request::builder()
        .uri("/api/v1/projects")
        .header("X-Backlog-Token", "oauth-123")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread")]
async fn list_projects_without_credentials_is_401() {
    let mut tools = MockToolInvoker::new();
    tools
        .expect_call_tool()
        .returning(|_| Err(ToolError::NoCredentials));
    let (_dir, app) = test_app(tools);

    let response = app.oneshot(get("/api/v1/projects")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("No credentials"));
}

// =============================================================================
// GET /api/v1/projects/{id}/{theme}
// =============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn overview_tolerates_optional_failures() {
    let mut tools = MockToolInvoker::new();
    tools.expect_call_tool().returning(|call| match call.name.as_str() {
        "get_project" => Ok(json!({"name": "Demo", "projectKey": "DEMO"})),
        _ => Err(ToolError::Network {
            message: "unreachable".to_string(),
        }),
    });
    let (_dir, app) = test_app(tools);

    let response = app
        .oneshot(get("/api/v1/projects/DEMO/overview"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["project"]["name"], "Demo");
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_project_is_404() {
    let mut tools = MockToolInvoker::new();
    tools.expect_call_tool().returning(|_| {
        Err(ToolError::Backlog {
            status: 404,
            message: "No project".to_string(),
        })
    });
    let (_dir, app) = test_app(tools);

    let response = app
        .oneshot(get("/api/v1/projects/NOPE/progress"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn upstream_failure_is_502() {
    let mut tools = MockToolInvoker::new();
    tools.expect_call_tool().returning(|_| {
        Err(ToolError::Network {
            message: "connection refused".to_string(),
        })
    });
    let (_dir, app) = test_app(tools);

    let response = app
        .oneshot(get("/api/v1/projects/42/issues"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test(flavor = "multi_thread")]
async fn team_falls_back_when_backlog_is_unreachable() {
    let mut tools = MockToolInvoker::new();
    tools.expect_call_tool().returning(|_| {
        Err(ToolError::Network {
            message: "connection refused".to_string(),
        })
    });
    let (_dir, app) = test_app(tools);

    let response = app.oneshot(get("/api/v1/projects/42/team")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["fallback"], true);
    assert_eq!(body["users"][0]["name"], "プロジェクトメンバー");
}

#[tokio::test(flavor = "multi_thread")]
async fn risks_filter_open_high_priority_issues() {
    let mut tools = MockToolInvoker::new();
    tools
        .expect_call_tool()
        .withf(|call| {
            call.name == "get_issues"
                && call.arguments["projectId"] == json!([42])
                && call.arguments["statusId"] == json!([1, 2, 3])
                && call.arguments["priorityId"] == json!([2, 3])
        })
        .times(1)
        .returning(|_| Ok(json!([{"summary": "Outage"}])));
    let (_dir, app) = test_app(tools);

    let response = app.oneshot(get("/api/v1/projects/42/risks")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["highPriorityIssues"][0]["summary"], "Outage");
}
