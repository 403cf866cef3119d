//! JSON-RPC 2.0 Envelope
//!
//! Request, response and error shapes shared by the server and the socket
//! client, plus the validating parser the dispatcher runs on every raw frame.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// JSON-RPC version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Method prefix for fire-and-forget notifications
pub const NOTIFICATION_PREFIX: &str = "notifications/";

/// Request ID can be either a string or a number.
///
/// The server never interprets it; it is only copied into the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(i64),
}

impl RequestId {
    /// Id used when the caller's id could not be recovered from a frame
    pub fn unknown() -> Self {
        RequestId::String(String::new())
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(RequestId::String(s.clone())),
            Value::Number(n) => n.as_i64().map(RequestId::Number),
            _ => None,
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Protocol-level error codes.
///
/// Tool-level failures never use these; they travel inside a successful
/// result as `isError: true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError = -32700,
    MethodNotFound = -32601,
    InvalidParams = -32602,
    InternalError = -32603,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -32700 => Some(ErrorCode::ParseError),
            -32601 => Some(ErrorCode::MethodNotFound),
            -32602 => Some(ErrorCode::InvalidParams),
            -32603 => Some(ErrorCode::InternalError),
            _ => None,
        }
    }
}

/// JSON-RPC 2.0 Request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    /// Protocol version (must be "2.0")
    pub jsonrpc: String,

    /// Request ID for correlating responses (None only for notifications)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,

    /// Method name (e.g., "tools/list", "echo")
    pub method: String,

    /// Method parameters, handed to the handler uninterpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    /// Check if this is a notification (no id = no response expected)
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Parse and validate one raw frame.
    ///
    /// Params are not inspected beyond being valid JSON.
    pub fn parse(raw: &str) -> Result<Self, MalformedRequest> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MalformedRequest::new("Empty request", None));
        }

        let value: Value = serde_json::from_str(trimmed).map_err(|e| {
            MalformedRequest::new("Parse error", None).with_diagnostics(json!({
                "error": e.to_string(),
                "line": e.line(),
                "column": e.column(),
            }))
        })?;

        let mut object = match value {
            Value::Object(object) => object,
            Value::Array(_) => {
                return Err(MalformedRequest::new("Invalid request: batch requests are not supported", None));
            }
            _ => {
                return Err(MalformedRequest::new("Invalid request: request must be a JSON object", None));
            }
        };

        let raw_id = object.remove("id");
        let recovered_id = raw_id.as_ref().and_then(RequestId::from_value);

        match object.get("jsonrpc") {
            Some(Value::String(v)) if v == JSONRPC_VERSION => {}
            Some(other) => {
                return Err(MalformedRequest::new(
                    "Invalid JSON-RPC version, expected '2.0'",
                    recovered_id,
                )
                .with_diagnostics(json!({ "jsonrpc": other })));
            }
            None => {
                return Err(MalformedRequest::new("Missing 'jsonrpc' field", recovered_id));
            }
        }

        let method = match object.remove("method") {
            Some(Value::String(m)) if !m.is_empty() => m,
            Some(Value::String(_)) => {
                return Err(MalformedRequest::new("Method cannot be empty", recovered_id));
            }
            Some(_) => {
                return Err(MalformedRequest::new("Method must be a string", recovered_id));
            }
            None => return Err(MalformedRequest::new("Missing 'method' field", recovered_id)),
        };

        let id = match (raw_id, recovered_id) {
            (_, Some(id)) => Some(id),
            (Some(Value::Null) | None, None) if method.starts_with(NOTIFICATION_PREFIX) => None,
            (Some(other), None) if !other.is_null() => {
                return Err(MalformedRequest::new("Request id must be a string or an integer", None)
                    .with_diagnostics(json!({ "id": other })));
            }
            _ => return Err(MalformedRequest::new("Missing 'id' field", None)),
        };

        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method,
            params: object.remove("params"),
        })
    }
}

/// A frame that could not be turned into a [`JsonRpcRequest`]
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct MalformedRequest {
    pub message: String,
    /// Best-effort id salvaged from the frame, if any
    pub recovered_id: Option<RequestId>,
    pub diagnostics: Option<Value>,
}

impl MalformedRequest {
    pub fn new(message: impl Into<String>, recovered_id: Option<RequestId>) -> Self {
        Self {
            message: message.into(),
            recovered_id,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Value) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Render as a ParseError response
    pub fn into_response(self) -> JsonRpcResponse {
        let id = self.recovered_id.unwrap_or_else(RequestId::unknown);
        let mut error = JsonRpcError::new(ErrorCode::ParseError, self.message);
        error.data = self.diagnostics;
        JsonRpcResponse::error(id, error)
    }
}

/// Exactly one of `result` or `error`, flattened into the response envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePayload {
    Result(Value),
    Error(JsonRpcError),
}

/// JSON-RPC 2.0 Response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    /// Protocol version
    pub jsonrpc: String,

    /// Request ID (copied from request)
    pub id: RequestId,

    #[serde(flatten)]
    pub payload: ResponsePayload,
}

impl JsonRpcResponse {
    /// Create a success response
    pub fn success(id: RequestId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Result(result),
        }
    }

    /// Create an error response
    pub fn error(id: RequestId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            payload: ResponsePayload::Error(error),
        }
    }

    /// Create a method not found error
    pub fn method_not_found(id: RequestId, method: &str) -> Self {
        Self::error(
            id,
            JsonRpcError::new(ErrorCode::MethodNotFound, format!("unknown method '{}'", method)),
        )
    }

    /// Create an invalid params error
    pub fn invalid_params(id: RequestId, message: impl Into<String>) -> Self {
        Self::error(id, JsonRpcError::new(ErrorCode::InvalidParams, message))
    }

    /// Create an internal error response
    pub fn internal_error(id: RequestId, message: impl Into<String>, data: Option<Value>) -> Self {
        let mut error = JsonRpcError::new(ErrorCode::InternalError, message);
        error.data = data;
        Self::error(id, error)
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Result(value) => Some(value),
            ResponsePayload::Error(_) => None,
        }
    }

    pub fn error_object(&self) -> Option<&JsonRpcError> {
        match &self.payload {
            ResponsePayload::Result(_) => None,
            ResponsePayload::Error(error) => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.payload, ResponsePayload::Error(_))
    }
}

/// JSON-RPC 2.0 Error Object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    /// Error code
    pub code: i32,

    /// Error message
    pub message: String,

    /// Additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn kind(&self) -> Option<ErrorCode> {
        ErrorCode::from_code(self.code)
    }
}
