use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::*;

struct Noop;

#[async_trait]
impl ToolHandler for Noop {
    async fn call(&self, _ctx: &ToolContext, _args: ToolArguments) -> Result<Value, ToolError> {
        Ok(Value::Null)
    }
}

fn issue_schema() -> InputSchema {
    InputSchema::new()
        .required("issueIdOrKey", Property::string("Issue ID or key"))
        .optional("count", Property::number("Page size"))
        .optional("order", Property::string("Sort order").one_of(&["asc", "desc"]))
        .optional(
            "statusId",
            Property::array_of(PropertyType::Number, "Status filter"),
        )
}

#[test]
fn test_missing_required_argument_is_rejected() {
    let err = issue_schema().validate(json!({"count": 5})).unwrap_err();
    assert_eq!(err.rpc_code(), -32602);
    assert!(err.to_string().contains("issueIdOrKey"));
}

#[test]
fn test_null_counts_as_missing() {
    assert!(
        issue_schema()
            .validate(json!({"issueIdOrKey": null}))
            .is_err()
    );
}

#[test]
fn test_wrong_types_are_rejected() {
    let schema = issue_schema();
    assert!(
        schema
            .validate(json!({"issueIdOrKey": 12}))
            .is_err()
    );
    assert!(
        schema
            .validate(json!({"issueIdOrKey": "A-1", "count": "5"}))
            .is_err()
    );
    assert!(
        schema
            .validate(json!({"issueIdOrKey": "A-1", "statusId": [1, "two"]}))
            .is_err()
    );
    assert!(
        schema
            .validate(json!({"issueIdOrKey": "A-1", "order": "sideways"}))
            .is_err()
    );
}

#[test]
fn test_non_object_arguments_are_rejected() {
    assert!(InputSchema::new().validate(json!([1, 2])).is_err());
    assert!(InputSchema::new().validate(json!("x")).is_err());
}

#[test]
fn test_null_arguments_are_an_empty_object() {
    let args = InputSchema::new().validate(Value::Null).unwrap();
    assert_eq!(args.into_value(), json!({}));
}

#[test]
fn test_valid_arguments_pass_through_with_unknown_keys() {
    let args = issue_schema()
        .validate(json!({"issueIdOrKey": "A-1", "count": 20, "extra": true}))
        .unwrap();

    assert_eq!(args.str("issueIdOrKey"), Some("A-1"));
    assert_eq!(args.get("extra"), Some(&json!(true)));
    assert_eq!(
        Value::Object(args.without(&["issueIdOrKey"])),
        json!({"count": 20, "extra": true})
    );
}

#[test]
fn test_first_of_accepts_strings_and_numbers() {
    let args = InputSchema::new()
        .validate(json!({"projectId": 42, "projectKey": ""}))
        .unwrap();
    assert_eq!(
        args.first_of(&["projectIdOrKey", "projectKey", "projectId"]),
        Some("42".to_string())
    );
    assert_eq!(args.first_of(&["missing"]), None);
}

#[test]
fn test_parse_into_typed_struct() {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Params {
        issue_id_or_key: String,
        count: Option<u32>,
    }

    let args = issue_schema()
        .validate(json!({"issueIdOrKey": "A-1", "count": 3}))
        .unwrap();
    let params: Params = args.parse().unwrap();
    assert_eq!(params.issue_id_or_key, "A-1");
    assert_eq!(params.count, Some(3));
}

#[test]
fn test_schema_serializes_as_json_schema() {
    let schema = serde_json::to_value(issue_schema()).unwrap();
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["required"], json!(["issueIdOrKey"]));
    assert_eq!(schema["properties"]["statusId"]["items"]["type"], "number");
    assert_eq!(schema["properties"]["order"]["enum"], json!(["asc", "desc"]));

    let empty = serde_json::to_value(InputSchema::new()).unwrap();
    assert!(empty.get("required").is_none());
}

#[test]
fn test_registry_rejects_duplicates_and_keeps_order() {
    let tool = |name: &str| ToolDefinition::new(name, "", InputSchema::new(), Arc::new(Noop));

    let registry = ToolRegistry::builder()
        .register(tool("b"))
        .register(tool("a"))
        .build()
        .unwrap();
    let names: Vec<_> = registry.list().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["b", "a"]);
    assert!(registry.get("a").is_some());
    assert!(registry.get("c").is_none());

    let dup = ToolRegistry::builder()
        .register(tool("a"))
        .register(tool("a"))
        .build();
    assert!(matches!(dup, Err(RegistryError::Duplicate { name }) if name == "a"));
}
