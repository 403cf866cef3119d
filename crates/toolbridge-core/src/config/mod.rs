//! Configuration management
//!
//! Reads and writes the server config at `~/.toolbridge/config.json`.
//! A missing file means defaults; a malformed one is an error.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common::error::ConfigError;
use crate::common::paths;

/// Wait bound applied to handler invocations unless configured otherwise
pub const DEFAULT_HANDLER_TIMEOUT_MS: u64 = 10_000;

fn default_handler_timeout_ms() -> Option<u64> {
    Some(DEFAULT_HANDLER_TIMEOUT_MS)
}

/// Per-tool enable switches. Tools not listed are enabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolToggles(BTreeMap<String, bool>);

impl ToolToggles {
    pub fn is_enabled(&self, tool_name: &str) -> bool {
        self.0.get(tool_name).copied().unwrap_or(true)
    }

    pub fn set(&mut self, tool_name: impl Into<String>, enabled: bool) {
        self.0.insert(tool_name.into(), enabled);
    }

    /// Drop every override, re-enabling all tools
    pub fn reset(&mut self) {
        self.0.clear();
    }

    pub fn disabled(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter(|(_, enabled)| !**enabled).map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// `None` waits for handlers indefinitely
    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<PathBuf>,

    #[serde(default)]
    pub tools: ToolToggles,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            handler_timeout_ms: default_handler_timeout_ms(),
            socket_path: None,
            tools: ToolToggles::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&paths::config_path()?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, content).map_err(io_err)
    }

    pub fn handler_timeout(&self) -> Option<Duration> {
        self.handler_timeout_ms.map(Duration::from_millis)
    }

    /// Configured socket path, falling back to `~/.toolbridge/toolbridge.sock`
    pub fn resolve_socket_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.socket_path {
            Some(path) => Ok(path.clone()),
            None => paths::socket_path(),
        }
    }

    pub fn is_tool_enabled(&self, tool_name: &str) -> bool {
        self.tools.is_enabled(tool_name)
    }

    pub fn set_tool_enabled(&mut self, tool_name: impl Into<String>, enabled: bool) {
        self.tools.set(tool_name, enabled);
    }
}
