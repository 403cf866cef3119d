//! Handler contract
//!
//! A handler reports domain outcomes as `Ok(ToolResult)`, including failures
//! (`ToolResult::error`). `Err(HandlerError)` is reserved for calls that could
//! not be attempted (bad params) or broke in an unexpected way.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use toolbridge_protocol::{ErrorCode, ToolResult};

pub type HandlerResult = Result<ToolResult, HandlerError>;

/// Synchronous handler that must run on the designated executor thread
pub type MainThreadFn = Arc<dyn Fn(Value) -> HandlerResult + Send + Sync>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandlerError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    pub fn invalid_params(message: impl Into<String>) -> Self {
        HandlerError::InvalidParams(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError::Internal(message.into())
    }

    /// Convert to JSON-RPC error code
    pub fn code(&self) -> ErrorCode {
        match self {
            HandlerError::InvalidParams(_) => ErrorCode::InvalidParams,
            HandlerError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

/// Async handler run on the dispatching runtime
#[async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    async fn call(&self, params: Value) -> HandlerResult;
}

/// Where a registered handler executes
#[derive(Clone)]
pub enum Invoker {
    /// On the dispatching task
    Inline(Arc<dyn ToolHandler>),
    /// Marshaled onto the designated single-threaded executor
    MainThread(MainThreadFn),
}

impl Invoker {
    pub fn affinity(&self) -> &'static str {
        match self {
            Invoker::Inline(_) => "inline",
            Invoker::MainThread(_) => "main-thread",
        }
    }
}

impl std::fmt::Debug for Invoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invoker::{}", self.affinity())
    }
}

/// Sync closures run on the blocking pool so they cannot stall the runtime
struct FnHandler<F>(Arc<F>);

#[async_trait]
impl<F> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
{
    async fn call(&self, params: Value) -> HandlerResult {
        let f = Arc::clone(&self.0);
        match tokio::task::spawn_blocking(move || f(params)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(HandlerError::internal(format!("blocking handler was cancelled: {}", e))),
        }
    }
}

struct AsyncFnHandler<F>(F);

#[async_trait]
impl<F, Fut> ToolHandler for AsyncFnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, params: Value) -> HandlerResult {
        (self.0)(params).await
    }
}

/// Wrap a synchronous closure as an inline handler.
///
/// The closure may block; it runs on tokio's blocking pool.
pub fn handler_fn<F>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value) -> HandlerResult + Send + Sync + 'static,
{
    Arc::new(FnHandler(Arc::new(f)))
}

/// Wrap an async closure as an inline handler
pub fn async_handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(AsyncFnHandler(f))
}

/// Read a required string argument, failing with InvalidParams
pub fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, HandlerError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::invalid_params(format!("missing required string parameter '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_handler_fn_passes_params_through() {
        let handler = handler_fn(|params| Ok(ToolResult::text(params.to_string())));
        let result = handler.call(json!({"a": 1})).await.unwrap();
        assert_eq!(result.joined_text(), r#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_handler_fn_runs_off_the_runtime_thread() {
        let runtime_thread = std::thread::current().id();
        let handler = handler_fn(move |_| {
            let same = std::thread::current().id() == runtime_thread;
            Ok(ToolResult::text(same.to_string()))
        });
        assert_eq!(handler.call(Value::Null).await.unwrap().joined_text(), "false");
    }

    #[tokio::test]
    async fn test_handler_fn_panic_propagates_to_caller() {
        let handler = handler_fn(|_| panic!("bad handler"));
        let joined = tokio::spawn(async move { handler.call(Value::Null).await }).await;

        let err = joined.unwrap_err();
        assert!(err.is_panic());
        assert_eq!(err.into_panic().downcast_ref::<&str>(), Some(&"bad handler"));
    }

    #[tokio::test]
    async fn test_async_handler_fn() {
        let handler = async_handler_fn(|_params| async {
            tokio::task::yield_now().await;
            Ok(ToolResult::text("done"))
        });
        assert_eq!(handler.call(Value::Null).await.unwrap().joined_text(), "done");
    }

    #[test]
    fn test_require_str() {
        let params = json!({"msg": "hi", "n": 3});
        assert_eq!(require_str(&params, "msg").unwrap(), "hi");
        assert_eq!(require_str(&params, "n").unwrap_err().code(), ErrorCode::InvalidParams);
        assert!(require_str(&Value::Null, "msg").is_err());
    }
}
