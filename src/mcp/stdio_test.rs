use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::stdio::serve;
use super::*;

struct Upper;

#[async_trait]
impl ToolHandler for Upper {
    async fn call(&self, _ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError> {
        Ok(json!(args.require_str("text")?.to_uppercase()))
    }
}

fn engine() -> McpEngine {
    let registry = ToolRegistry::builder()
        .register(ToolDefinition::new(
            "upper",
            "Uppercase text",
            InputSchema::new().required("text", Property::string("Input")),
            Arc::new(Upper),
        ))
        .build()
        .unwrap();
    McpEngine::new(Arc::new(registry), ServerInfo::new("stdio-test", "1"))
}

async fn run(input: &str) -> Vec<Value> {
    let mut out = Vec::new();
    serve(&engine(), input.as_bytes(), &mut out).await.unwrap();
    String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_one_response_line_per_request_in_order() {
    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
        "\n",
        r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        "\n\n",
        r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"upper","arguments":{"text":"abc"}}}"#,
        "\n",
    );

    let responses = run(input).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[1]["id"], 2);
    assert_eq!(responses[1]["result"]["content"][0]["text"], "\"ABC\"");
}

#[tokio::test]
async fn test_unparsable_line_gets_parse_error_with_null_id() {
    let responses = run("{not json\n").await;

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["error"]["code"], -32700);
}

#[tokio::test]
async fn test_non_request_object_is_invalid_request() {
    let responses = run("{\"jsonrpc\":\"2.0\",\"id\":9}\n[1,2]\n").await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["error"]["code"], -32600);
    assert_eq!(responses[0]["id"], 9);
    assert_eq!(responses[1]["error"]["code"], -32600);
    assert_eq!(responses[1]["id"], Value::Null);
}

#[tokio::test]
async fn test_serving_continues_after_bad_lines() {
    let input = concat!(
        "garbage\n",
        r#"{"jsonrpc":"2.0","id":"x","method":"tools/list"}"#,
        "\n",
    );

    let responses = run(input).await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[1]["id"], "x");
    assert_eq!(responses[1]["result"]["tools"][0]["name"], "upper");
}
