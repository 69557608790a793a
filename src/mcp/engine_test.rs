use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::protocol::Outcome;
use super::*;

struct Echo {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ToolHandler for Echo {
    async fn call(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"echo": args.into_value(), "token": ctx.access_token}))
    }
}

struct Failing;

#[async_trait]
impl ToolHandler for Failing {
    async fn call(&self, _ctx: &ToolContext, _args: ToolArguments) -> Result<Value, ToolError> {
        Err(ToolError::Backlog {
            status: 404,
            message: "No project".to_string(),
        })
    }
}

struct Panicking;

#[async_trait]
impl ToolHandler for Panicking {
    async fn call(&self, _ctx: &ToolContext, _args: ToolArguments) -> Result<Value, ToolError> {
        panic!("handler bug");
    }
}

fn engine() -> (McpEngine, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = ToolRegistry::builder()
        .register(ToolDefinition::new(
            "echo",
            "Echo the arguments",
            InputSchema::new().required("word", Property::string("Word")),
            Arc::new(Echo {
                calls: Arc::clone(&calls),
            }),
        ))
        .register(ToolDefinition::new(
            "fail",
            "Always fails",
            InputSchema::new(),
            Arc::new(Failing),
        ))
        .register(ToolDefinition::new(
            "panic",
            "Always panics",
            InputSchema::new(),
            Arc::new(Panicking),
        ))
        .build()
        .unwrap();
    (
        McpEngine::new(Arc::new(registry), ServerInfo::new("test", "0.0.1")),
        calls,
    )
}

fn call(id: i64, name: &str, arguments: Value) -> McpRequest {
    McpRequest::new(id, "tools/call").with_params(json!({"name": name, "arguments": arguments}))
}

fn error_code(response: &McpResponse) -> i32 {
    response.error_ref().expect("expected an error").code
}

#[tokio::test]
async fn test_initialize_reports_protocol_and_tools_capability() {
    let (engine, _) = engine();
    let resp = engine.handle(McpRequest::new(1, "initialize")).await.unwrap();

    assert_eq!(
        resp.result().unwrap(),
        &json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "test", "version": "0.0.1"}
        })
    );
}

#[tokio::test]
async fn test_initialized_notification_has_no_response() {
    let (engine, _) = engine();
    let resp = engine
        .handle(McpRequest::notification("notifications/initialized"))
        .await;
    assert!(resp.is_none());
}

#[tokio::test]
async fn test_ping_returns_empty_result() {
    let (engine, calls) = engine();
    let resp = engine.handle(McpRequest::new(9, "ping")).await.unwrap();

    assert_eq!(resp.id, Some(RequestId::Number(9)));
    assert_eq!(resp.result(), Some(&json!({})));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_tools_list_in_registration_order() {
    let (engine, _) = engine();
    let resp = engine.handle(McpRequest::new(2, "tools/list")).await.unwrap();

    let tools = resp.result().unwrap()["tools"].as_array().unwrap().clone();
    let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["echo", "fail", "panic"]);
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["word"]));
}

#[tokio::test]
async fn test_call_before_initialize_is_accepted() {
    let (engine, calls) = engine();
    let resp = engine
        .handle(call(3, "echo", json!({"word": "hi"})))
        .await
        .unwrap();

    assert_eq!(resp.id, Some(RequestId::Number(3)));
    let text = resp.result().unwrap()["content"][0]["text"]
        .as_str()
        .unwrap()
        .to_string();
    let payload: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(payload["echo"], json!({"word": "hi"}));
    assert_eq!(resp.result().unwrap()["content"][0]["type"], "text");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_tool_never_invokes_a_handler() {
    let (engine, calls) = engine();
    let resp = engine.handle(call(4, "nope", json!({}))).await.unwrap();

    assert_eq!(error_code(&resp), -32601);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_method() {
    let (engine, _) = engine();
    let resp = engine
        .handle(McpRequest::new(5, "resources/list"))
        .await
        .unwrap();
    assert_eq!(error_code(&resp), -32601);
}

#[tokio::test]
async fn test_schema_violation_is_invalid_params() {
    let (engine, calls) = engine();

    let missing = engine.handle(call(6, "echo", json!({}))).await.unwrap();
    let wrong_type = engine
        .handle(call(7, "echo", json!({"word": 1})))
        .await
        .unwrap();
    let no_params = engine
        .handle(McpRequest::new(8, "tools/call"))
        .await
        .unwrap();

    assert_eq!(error_code(&missing), -32602);
    assert_eq!(error_code(&wrong_type), -32602);
    assert_eq!(error_code(&no_params), -32602);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_error_becomes_internal_error() {
    let (engine, _) = engine();
    let resp = engine.handle(call(9, "fail", json!({}))).await.unwrap();

    assert_eq!(error_code(&resp), -32603);
    assert!(resp.error_ref().unwrap().message.contains("No project"));
}

#[tokio::test]
async fn test_handler_panic_is_contained() {
    let (engine, _) = engine();
    let resp = engine.handle(call(10, "panic", json!({}))).await.unwrap();
    assert_eq!(error_code(&resp), -32603);

    // The engine keeps serving after a panic.
    let after = engine
        .handle(call(11, "echo", json!({"word": "still here"})))
        .await
        .unwrap();
    assert!(matches!(after.outcome, Outcome::Result(_)));
}

#[tokio::test]
async fn test_wrong_jsonrpc_version() {
    let (engine, _) = engine();
    let mut request = McpRequest::new(12, "tools/list");
    request.jsonrpc = "1.0".to_string();

    let resp = engine.handle(request).await.unwrap();
    assert_eq!(error_code(&resp), -32600);
}

#[tokio::test]
async fn test_context_token_reaches_the_handler() {
    let (engine, _) = engine();
    let ctx = ToolContext::with_token(Some("secret".to_string()));

    let result = engine
        .call_tool("echo", json!({"word": "x"}), &ctx)
        .await
        .unwrap();
    assert_eq!(result.payload().unwrap()["token"], "secret");
}

#[test]
fn test_empty_token_is_ignored() {
    assert!(
        ToolContext::with_token(Some(String::new()))
            .access_token
            .is_none()
    );
}
