use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::bridge::{SESSION_HEADER, router};
use super::*;

struct Count;

#[async_trait]
impl ToolHandler for Count {
    async fn call(&self, _ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        let items = args
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        Ok(json!({"count": items}))
    }
}

fn app() -> axum::Router {
    let registry = ToolRegistry::builder()
        .register(ToolDefinition::new(
            "count_items",
            "Count array items",
            InputSchema::new().required(
                "items",
                Property::array_of(PropertyType::Number, "Items"),
            ),
            Arc::new(Count),
        ))
        .build()
        .unwrap();
    router(Arc::new(McpEngine::new(
        Arc::new(registry),
        ServerInfo::new("bridge-test", "1"),
    )))
}

fn post(uri: &str, body: &str, session: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(session) = session {
        builder = builder.header(SESSION_HEADER, session);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_call_returns_raw_tool_result_and_echoes_session() {
    let response = app()
        .oneshot(post(
            "/mcp/call",
            r#"{"tool":"count_items","args":{"items":[1,2,3]}}"#,
            Some("sess-1"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[SESSION_HEADER], "sess-1");
    let body = json_body(response).await;
    assert_eq!(
        body,
        json!({"result": {"content": [{"type": "text", "text": "{\"count\":3}"}]}})
    );
}

#[tokio::test]
async fn test_session_id_is_generated_when_absent() {
    let response = app()
        .oneshot(post(
            "/mcp/call",
            r#"{"tool":"count_items","args":{"items":[]}}"#,
            None,
        ))
        .await
        .unwrap();

    let session = response.headers()[SESSION_HEADER].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(session).is_ok());
}

#[tokio::test]
async fn test_tool_errors_are_400_with_code() {
    let unknown = app()
        .oneshot(post("/mcp/call", r#"{"tool":"nope"}"#, None))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(unknown).await["code"], -32601);

    let invalid = app()
        .oneshot(post(
            "/mcp/call",
            r#"{"tool":"count_items","args":{"items":"x"}}"#,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(invalid).await["code"], -32602);
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let response = app()
        .oneshot(post("/mcp/call", "{", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());
}

#[tokio::test]
async fn test_raw_envelope_and_notification() {
    let reply = app()
        .oneshot(post(
            "/mcp",
            r#"{"jsonrpc":"2.0","id":5,"method":"tools/list"}"#,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(reply.status(), StatusCode::OK);
    let body = json_body(reply).await;
    assert_eq!(body["id"], 5);
    assert_eq!(body["result"]["tools"][0]["name"], "count_items");

    let notification = app()
        .oneshot(post(
            "/mcp",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(notification.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "ok"}));
}
