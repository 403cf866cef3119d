//! MCP handshake types exchanged by `initialize`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

/// Reserved method names answered by the dispatcher itself
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";

    pub const RESERVED: &[&str] = &[INITIALIZE, TOOLS_LIST, TOOLS_CALL];

    pub fn is_reserved(name: &str) -> bool {
        RESERVED.contains(&name) || name.starts_with(crate::jsonrpc::NOTIFICATION_PREFIX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeRequest {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub capabilities: Value,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServerCapabilities {
    pub tools: ToolsCapabilities,
}

/// The registry is frozen after startup, so `listChanged` is always false
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapabilities {
    pub list_changed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reserved_names() {
        assert!(methods::is_reserved("tools/list"));
        assert!(methods::is_reserved("notifications/initialized"));
        assert!(!methods::is_reserved("echo"));
        assert!(!methods::is_reserved("Tools/List"));
    }

    #[test]
    fn test_initialize_request_is_lenient() {
        let req: InitializeRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.client_info.is_none());

        let req: InitializeRequest = serde_json::from_value(json!({
            "protocolVersion": "2025-03-26",
            "clientInfo": {"name": "inspector", "version": "0.1"}
        }))
        .unwrap();
        assert_eq!(req.client_info.unwrap().name, "inspector");
    }
}
