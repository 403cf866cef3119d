//! Dispatcher
//!
//! Turns one request into one response: parse, route through the registry,
//! invoke the handler inside a failure boundary, wrap the outcome.
//!
//! Tool-level failures (`ToolResult { is_error: true }`) are returned as a
//! successful response. Only problems with the call itself (unparseable
//! frame, unknown method, bad params, a crashed or stuck handler) become
//! JSON-RPC errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Map, Value};
use toolbridge_protocol::jsonrpc::NOTIFICATION_PREFIX;
use toolbridge_protocol::mcp::methods;
use toolbridge_protocol::{
    ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId, ToolCallParams, ToolResult,
};
use tracing::{debug, info, warn};

use crate::discovery::{self, ServerIdentity};
use crate::executor::{panic_message, ExecutorError, MainThreadHandle};
use crate::registry::{HandlerEntry, HandlerError, Invoker, ToolRegistry};

/// Result of handling one raw frame
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Response(JsonRpcResponse),
    /// Notifications are acknowledged by silence
    NoResponse,
}

impl DispatchOutcome {
    pub fn into_response(self) -> Option<JsonRpcResponse> {
        match self {
            DispatchOutcome::Response(response) => Some(response),
            DispatchOutcome::NoResponse => None,
        }
    }
}

/// Why a handler produced no `ToolResult`
#[derive(Debug, thiserror::Error)]
enum InvocationError {
    #[error("{0}")]
    Handler(HandlerError),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("handler did not finish within {}ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("handler task was cancelled")]
    Cancelled,

    #[error("no main-thread executor is attached")]
    NoExecutor,

    #[error("main-thread executor is not running")]
    ExecutorClosed,
}

impl InvocationError {
    fn into_response(self, id: RequestId, tool: &str) -> JsonRpcResponse {
        let error = match self {
            InvocationError::Handler(HandlerError::InvalidParams(message)) => {
                JsonRpcError::new(ErrorCode::InvalidParams, message)
            }
            InvocationError::Handler(HandlerError::Internal(message)) => {
                JsonRpcError::new(ErrorCode::InternalError, message).with_data(json!({ "tool": tool }))
            }
            InvocationError::Panicked(panic) => {
                JsonRpcError::new(ErrorCode::InternalError, format!("handler for '{}' panicked", tool))
                    .with_data(json!({ "reason": "panic", "panic": panic, "tool": tool }))
            }
            InvocationError::TimedOut(limit) => {
                JsonRpcError::new(ErrorCode::InternalError, format!("handler for '{}' timed out", tool))
                    .with_data(json!({ "reason": "timeout", "timeoutMs": limit.as_millis() as u64, "tool": tool }))
            }
            other => JsonRpcError::new(ErrorCode::InternalError, other.to_string()).with_data(json!({ "tool": tool })),
        };
        JsonRpcResponse::error(id, error)
    }
}

impl From<ExecutorError> for InvocationError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Closed => InvocationError::ExecutorClosed,
            ExecutorError::Panicked(message) => InvocationError::Panicked(message),
        }
    }
}

pub struct DispatcherBuilder {
    registry: Arc<ToolRegistry>,
    main_thread: Option<MainThreadHandle>,
    timeout: Option<Duration>,
    identity: ServerIdentity,
}

impl DispatcherBuilder {
    /// Executor used for handlers registered with main-thread affinity
    pub fn main_thread(mut self, handle: MainThreadHandle) -> Self {
        self.main_thread = Some(handle);
        self
    }

    /// Bound every handler invocation. Without one the dispatcher waits indefinitely.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn identity(mut self, identity: ServerIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn build(self) -> Dispatcher {
        if self.main_thread.is_none() && self.registry.needs_main_thread() {
            warn!("Registry has main-thread tools but no executor is attached; those calls will fail");
        }

        Dispatcher {
            registry: self.registry,
            main_thread: self.main_thread,
            timeout: self.timeout,
            identity: self.identity,
        }
    }
}

/// Stateless request router over a frozen registry.
///
/// Safe to share behind an `Arc` and call concurrently.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    main_thread: Option<MainThreadHandle>,
    timeout: Option<Duration>,
    identity: ServerIdentity,
}

impl Dispatcher {
    pub fn builder(registry: Arc<ToolRegistry>) -> DispatcherBuilder {
        DispatcherBuilder {
            registry,
            main_thread: None,
            timeout: None,
            identity: ServerIdentity::default(),
        }
    }

    /// Dispatcher with no executor and no timeout
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self::builder(registry).build()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Handle one raw frame as received from a transport
    pub async fn handle_raw(&self, raw: &str) -> DispatchOutcome {
        let request = match JsonRpcRequest::parse(raw) {
            Ok(request) => request,
            Err(malformed) => {
                warn!("Rejecting malformed request: {}", malformed);
                return DispatchOutcome::Response(malformed.into_response());
            }
        };

        if request.is_notification() {
            debug!("Notification {} received", request.method);
            return DispatchOutcome::NoResponse;
        }

        DispatchOutcome::Response(self.handle(request).await)
    }

    /// Route a parsed request and produce its response
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.unwrap_or_else(RequestId::unknown);
        let params = request.params.unwrap_or_else(|| Value::Object(Map::new()));
        let method = request.method;

        debug!("Dispatching {} [{}]", method, id);

        match method.as_str() {
            methods::INITIALIZE => match discovery::initialize(&self.identity, params) {
                Ok(response) => to_response(id, &response),
                Err(e) => JsonRpcResponse::invalid_params(id, format!("invalid initialize params: {}", e)),
            },
            methods::TOOLS_LIST => to_response(id, &discovery::list_tools(&self.registry)),
            methods::TOOLS_CALL => match serde_json::from_value::<ToolCallParams>(params) {
                Ok(call) => self.invoke(id, &call.name, call.arguments).await,
                Err(e) => JsonRpcResponse::invalid_params(id, format!("invalid tools/call params: {}", e)),
            },
            m if m.starts_with(NOTIFICATION_PREFIX) => to_response(id, &ToolResult::text("ok")),
            tool => self.invoke(id, tool, params).await,
        }
    }

    async fn invoke(&self, id: RequestId, tool: &str, params: Value) -> JsonRpcResponse {
        let Some(entry) = self.registry.lookup(tool) else {
            debug!("Unknown method {} [{}]", tool, id);
            return JsonRpcResponse::method_not_found(id, tool);
        };

        let started = Instant::now();
        let outcome = self.run_handler(entry, params).await;
        let elapsed_ms = started.elapsed().as_millis();

        match outcome {
            Ok(result) => {
                info!(
                    "Tool {} [{}] finished in {}ms{}",
                    tool,
                    id,
                    elapsed_ms,
                    if result.is_error { " (reported error)" } else { "" }
                );
                to_response(id, &result)
            }
            Err(err) => {
                warn!("Tool {} [{}] failed after {}ms: {}", tool, id, elapsed_ms, err);
                err.into_response(id, tool)
            }
        }
    }

    async fn run_handler(&self, entry: &HandlerEntry, params: Value) -> Result<ToolResult, InvocationError> {
        match &entry.invoker {
            Invoker::Inline(handler) => {
                let handler = Arc::clone(handler);
                let mut task = tokio::spawn(async move { handler.call(params).await });

                let joined = match self.timeout {
                    Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            task.abort();
                            return Err(InvocationError::TimedOut(limit));
                        }
                    },
                    None => task.await,
                };

                match joined {
                    Ok(result) => result.map_err(InvocationError::Handler),
                    Err(e) if e.is_panic() => Err(InvocationError::Panicked(panic_message(e.into_panic().as_ref()))),
                    Err(_) => Err(InvocationError::Cancelled),
                }
            }
            Invoker::MainThread(handler) => {
                let executor = self.main_thread.as_ref().ok_or(InvocationError::NoExecutor)?;
                let handler = Arc::clone(handler);
                let job = executor.run(move || handler(params));

                let outcome = match self.timeout {
                    Some(limit) => tokio::time::timeout(limit, job)
                        .await
                        .map_err(|_| InvocationError::TimedOut(limit))?,
                    None => job.await,
                };

                outcome?.map_err(InvocationError::Handler)
            }
        }
    }
}

fn to_response<T: serde::Serialize>(id: RequestId, value: &T) -> JsonRpcResponse {
    match serde_json::to_value(value) {
        Ok(result) => JsonRpcResponse::success(id, result),
        Err(e) => JsonRpcResponse::internal_error(id, format!("failed to serialize result: {}", e), None),
    }
}
