//! Tool definitions, argument validation and the immutable registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use super::error::ToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl PropertyType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            PropertyType::String => value.is_string(),
            PropertyType::Number => value.is_number(),
            PropertyType::Integer => value.is_i64() || value.is_u64(),
            PropertyType::Boolean => value.is_boolean(),
            PropertyType::Array => value.is_array(),
            PropertyType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::String => "string",
            PropertyType::Number => "number",
            PropertyType::Integer => "integer",
            PropertyType::Boolean => "boolean",
            PropertyType::Array => "array",
            PropertyType::Object => "object",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Property {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Property>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
}

impl Property {
    pub fn new(kind: PropertyType, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            items: None,
            allowed: None,
        }
    }

    pub fn string(description: impl Into<String>) -> Self {
        Self::new(PropertyType::String, description)
    }

    pub fn number(description: impl Into<String>) -> Self {
        Self::new(PropertyType::Number, description)
    }

    pub fn boolean(description: impl Into<String>) -> Self {
        Self::new(PropertyType::Boolean, description)
    }

    pub fn array_of(kind: PropertyType, description: impl Into<String>) -> Self {
        Self {
            items: Some(Box::new(Self::new(kind, ""))),
            ..Self::new(PropertyType::Array, description)
        }
    }

    pub fn one_of(mut self, allowed: &[&str]) -> Self {
        self.allowed = Some(allowed.iter().map(|s| s.to_string()).collect());
        self
    }

    fn check(&self, name: &str, value: &Value) -> Result<(), ToolError> {
        if !self.kind.accepts(value) {
            return Err(ToolError::invalid(format!(
                "'{name}' must be of type {}",
                self.kind
            )));
        }
        if let (Some(allowed), Some(text)) = (&self.allowed, value.as_str())
            && !allowed.iter().any(|a| a == text)
        {
            return Err(ToolError::invalid(format!(
                "'{name}' must be one of: {}",
                allowed.join(", ")
            )));
        }
        if let (Some(items), Some(elements)) = (&self.items, value.as_array()) {
            for (i, element) in elements.iter().enumerate() {
                items.check(&format!("{name}[{i}]"), element)?;
            }
        }
        Ok(())
    }
}

/// JSON Schema subset used for tool inputs: an object with typed properties.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    properties: BTreeMap<String, Property>,
    required: Vec<String>,
}

impl Serialize for InputSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(rename = "type")]
            kind: &'static str,
            properties: &'a BTreeMap<String, Property>,
            #[serde(skip_serializing_if = "<[String]>::is_empty")]
            required: &'a [String],
        }
        Wire {
            kind: "object",
            properties: &self.properties,
            required: &self.required,
        }
        .serialize(serializer)
    }
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optional(mut self, name: &str, property: Property) -> Self {
        self.properties.insert(name.to_string(), property);
        self
    }

    pub fn required(mut self, name: &str, property: Property) -> Self {
        self.required.push(name.to_string());
        self.optional(name, property)
    }

    /// Check `arguments` against the schema.
    ///
    /// `null` counts as an empty object. Unknown keys pass through untouched.
    pub fn validate(&self, arguments: Value) -> Result<ToolArguments, ToolError> {
        let map = match arguments {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(ToolError::invalid(format!(
                    "arguments must be an object, got {other}"
                )));
            }
        };

        for name in &self.required {
            if map.get(name).is_none_or(Value::is_null) {
                return Err(ToolError::invalid(format!(
                    "missing required argument '{name}'"
                )));
            }
        }

        for (name, value) in &map {
            if value.is_null() {
                continue;
            }
            if let Some(property) = self.properties.get(name) {
                property.check(name, value)?;
            }
        }

        Ok(ToolArguments(map))
    }
}

/// Validated tool arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments(Map<String, Value>);

impl ToolArguments {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn require_str(&self, key: &str) -> Result<&str, ToolError> {
        self.str(key)
            .ok_or_else(|| ToolError::invalid(format!("missing required argument '{key}'")))
    }

    /// First present key rendered as a path segment. Numbers are accepted.
    pub fn first_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| match self.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }

    /// Arguments minus `keys`, used once path parameters are consumed.
    pub fn without(&self, keys: &[&str]) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(k, v)| !keys.contains(&k.as_str()) && !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| ToolError::invalid(e.to_string()))
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// Per-call context handed to handlers.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Caller-supplied credential overriding the server's configured one.
    pub access_token: Option<String>,
}

impl ToolContext {
    pub fn with_token(token: Option<String>) -> Self {
        Self {
            access_token: token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, ctx: &ToolContext, args: ToolArguments) -> Result<Value, ToolError>;
}

#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            handler,
        }
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Serialize for ToolDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            name: &'a str,
            description: &'a str,
            input_schema: &'a InputSchema,
        }
        Wire {
            name: &self.name,
            description: &self.description,
            input_schema: &self.input_schema,
        }
        .serialize(serializer)
    }
}

#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Tool '{name}' is registered twice")]
    #[diagnostic(code(presenter::mcp::duplicate_tool))]
    Duplicate { name: String },
}

/// Name-indexed tool set. Built once, read-only afterwards.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDefinition>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Definitions in registration order.
    pub fn list(&self) -> &[ToolDefinition] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Default)]
pub struct ToolRegistryBuilder {
    tools: Vec<ToolDefinition>,
}

impl ToolRegistryBuilder {
    pub fn register(mut self, tool: ToolDefinition) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn extend(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        self.tools.extend(tools);
        self
    }

    pub fn build(self) -> Result<ToolRegistry, RegistryError> {
        let mut index = HashMap::with_capacity(self.tools.len());
        for (i, tool) in self.tools.iter().enumerate() {
            if index.insert(tool.name.clone(), i).is_some() {
                return Err(RegistryError::Duplicate {
                    name: tool.name.clone(),
                });
            }
        }
        Ok(ToolRegistry {
            tools: self.tools,
            index,
        })
    }
}
