//! Tool dispatch core for toolbridge.
//!
//! Collaborators register tools on a [`RegistryBuilder`], freeze it, and hand
//! the resulting [`ToolRegistry`] to a [`Dispatcher`]. A transport feeds raw
//! frames to [`Dispatcher::handle_raw`] and writes back whatever response it
//! produces; [`server`] provides stdio-style and Unix socket transports.

pub mod common;
pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod executor;
pub mod registry;
pub mod server;

pub use config::{ServerConfig, ToolToggles, DEFAULT_HANDLER_TIMEOUT_MS};
pub use discovery::ServerIdentity;
pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherBuilder};
pub use executor::{ExecutorError, MainThreadHandle, MainThreadQueue, DEFAULT_JOBS_PER_PUMP};
pub use registry::{
    async_handler_fn, handler_fn, require_str, HandlerEntry, HandlerError, HandlerResult, Invoker, RegistryBuilder,
    RegistryError, ToolHandler, ToolRegistry,
};
pub use server::serve_stream;
#[cfg(unix)]
pub use server::{ServerStatus, SocketServer};
