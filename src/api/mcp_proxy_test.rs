//! Integration tests for the `/mcp` session proxy.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tower::ServiceExt;

use crate::api::{AppState, create_router};
use crate::cache::{AudioCache, SpeechService};
use crate::config::AppConfig;
use crate::generation::Orchestrator;
use crate::mcp::bridge::SESSION_HEADER;
use crate::mcp::{MockToolInvoker, SessionManager, StdioUpstream};
use crate::providers::{SpeechChain, TextChain};

/// Fake tool server answering each request with its method name.
async fn echo_server(input: DuplexStream, mut output: DuplexStream) {
    let mut lines = BufReader::new(input).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let request: Value = serde_json::from_str(&line).unwrap();
        let Some(id) = request.get("id").cloned() else {
            continue;
        };
        let reply = json!({"jsonrpc": "2.0", "id": id, "result": {"method": request["method"]}});
        let mut out = serde_json::to_vec(&reply).unwrap();
        out.push(b'\n');
        output.write_all(&out).await.unwrap();
    }
}

fn state(dir: &TempDir) -> AppState {
    let cache = Arc::new(AudioCache::new(dir.path()).unwrap());
    let speech = SpeechService::new(cache, SpeechChain::new(Vec::new()));
    let orchestrator = Orchestrator::new(
        Arc::new(MockToolInvoker::new()),
        TextChain::new(Vec::new()),
        speech,
    );
    AppState::new(orchestrator, AppConfig::default())
}

/// Create a test app proxying onto [`echo_server`]
fn test_app() -> (TempDir, Arc<StdioUpstream>, axum::Router) {
    let dir = TempDir::new().unwrap();
    let (client_out, server_in) = tokio::io::duplex(4096);
    let (server_out, client_in) = tokio::io::duplex(4096);
    tokio::spawn(echo_server(server_in, server_out));
    let upstream = Arc::new(StdioUpstream::from_io(
        client_in,
        client_out,
        SessionManager::default(),
    ));
    let app = create_router(state(&dir).with_upstream(Arc::clone(&upstream)));
    (dir, upstream, app)
}

/// Helper to parse JSON response body
async fn json_body(response: axum::response::Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn rpc(body: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json");
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn proxy_is_not_mounted_without_tool_server() {
    let dir = TempDir::new().unwrap();
    let app = create_router(state(&dir));

    let response = app
        .oneshot(rpc(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn reply_carries_client_id_and_session() {
    let (_dir, _upstream, app) = test_app();

    let response = app
        .oneshot(rpc(
            r#"{"jsonrpc":"2.0","id":"client-7","method":"tools/list"}"#,
            Some("session-a"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[SESSION_HEADER], "session-a");
    let body = json_body(response).await;
    assert_eq!(body["id"], "client-7");
    assert_eq!(body["result"]["method"], "tools/list");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_session_header_gets_a_fresh_session() {
    let (_dir, _upstream, app) = test_app();

    let response = app
        .oneshot(rpc(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let session = response.headers()[SESSION_HEADER].to_str().unwrap();
    assert!(!session.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn notification_is_accepted_without_body() {
    let (_dir, _upstream, app) = test_app();

    let response = app
        .oneshot(rpc(
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            Some("session-a"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_envelope_is_400() {
    let (_dir, _upstream, app) = test_app();

    let response = app.oneshot(rpc("{not json", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn close_requires_session_header() {
    let (_dir, _upstream, app) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/mcp")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Missing session ID");
}

#[tokio::test(flavor = "multi_thread")]
async fn close_reports_closed() {
    let (_dir, upstream, app) = test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/mcp")
                .header(SESSION_HEADER, "session-a")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body, json!({"status": "closed"}));
    assert_eq!(upstream.sessions().pending("session-a"), 0);
}
