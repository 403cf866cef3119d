//! Tool Result Model
//!
//! The payload every handler returns and the descriptors used for discovery.
//! A result with `isError: true` is still a successful RPC response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single piece of handler output.
///
/// Tagged on `type` so new kinds can be added without breaking readers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text.as_str()),
        }
    }
}

/// Uniform success/failure payload from a handler
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    /// Successful outcome described by one text block
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: false,
        }
    }

    /// Domain failure described by one text block
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
        }
    }

    /// Successful outcome carrying a JSON document rendered as text
    pub fn json(value: &Value) -> Self {
        let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        Self::text(text)
    }

    /// Concatenated text of every text block
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Discovery entry for one registered tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, input_schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }
}

/// Build an object schema in which every listed property is required.
///
/// # Example
/// ```
/// use serde_json::json;
/// use toolbridge_protocol::tool::object_schema;
///
/// let schema = object_schema([("path", json!({"type": "string"}))]);
/// assert_eq!(schema["required"], json!(["path"]));
/// ```
pub fn object_schema<I, K>(properties: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let properties: Map<String, Value> = properties.into_iter().map(|(k, v)| (k.into(), v)).collect();

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    if !properties.is_empty() {
        let required = properties.keys().cloned().map(Value::String).collect();
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema.insert("properties".to_string(), Value::Object(properties));
    Value::Object(schema)
}

/// Params of the MCP `tools/call` method
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default = "empty_object")]
    pub arguments: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Discovery result: a regular tool result plus the structured descriptor list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolsListResult {
    #[serde(flatten)]
    pub result: ToolResult,
    pub tools: Vec<ToolDescriptor>,
}

impl ToolsListResult {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        let listing = serde_json::to_value(&tools).unwrap_or_else(|_| Value::Array(Vec::new()));
        Self {
            result: ToolResult::text(listing.to_string()),
            tools,
        }
    }
}
