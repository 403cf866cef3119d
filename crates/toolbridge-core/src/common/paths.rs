//! Path Utilities
//!
//! Common path resolution for toolbridge directories and files.

use std::path::PathBuf;

use super::error::ConfigError;

/// Get the toolbridge base directory (`~/.toolbridge/`)
pub fn toolbridge_dir() -> Result<PathBuf, ConfigError> {
    let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
    Ok(home.join(".toolbridge"))
}

/// Get a path within the toolbridge directory
///
/// # Example
/// ```ignore
/// let socket = toolbridge_path("toolbridge.sock")?;
/// ```
pub fn toolbridge_path(relative_path: &str) -> Result<PathBuf, ConfigError> {
    Ok(toolbridge_dir()?.join(relative_path))
}

/// Get the toolbridge socket path
pub fn socket_path() -> Result<PathBuf, ConfigError> {
    toolbridge_path("toolbridge.sock")
}

/// Get the server config file path
pub fn config_path() -> Result<PathBuf, ConfigError> {
    toolbridge_path("config.json")
}
