//! Common Utilities
//!
//! Shared error types and path helpers used across the crate.

pub mod error;
pub mod paths;

pub use error::{ConfigError, ServerError};
pub use paths::{config_path, socket_path, toolbridge_dir, toolbridge_path};
