//! Capability discovery
//!
//! Answers the reserved `initialize` and `tools/list` methods from the frozen
//! registry. Nothing here is registered as a tool.

use serde_json::Value;
use toolbridge_protocol::mcp::{
    InitializeRequest, InitializeResponse, ServerCapabilities, ServerInfo, ToolsCapabilities, MCP_PROTOCOL_VERSION,
};
use toolbridge_protocol::ToolsListResult;
use tracing::{debug, info};

use crate::registry::ToolRegistry;

/// Identity and usage hints reported during the handshake
#[derive(Debug, Clone, PartialEq)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl ServerIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            instructions: None,
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self::new("toolbridge", env!("CARGO_PKG_VERSION"))
    }
}

/// Build the `initialize` result.
///
/// Any client protocol version is accepted; the server states its own and
/// the client adapts.
pub fn initialize(identity: &ServerIdentity, params: Value) -> Result<InitializeResponse, serde_json::Error> {
    let request: InitializeRequest = serde_json::from_value(params)?;

    match &request.client_info {
        Some(client) => info!(
            "Client {} {} connected (protocol {})",
            client.name,
            client.version,
            request.protocol_version.as_deref().unwrap_or("unspecified")
        ),
        None => debug!("Client connected without clientInfo"),
    }

    Ok(InitializeResponse {
        protocol_version: MCP_PROTOCOL_VERSION.to_string(),
        capabilities: ServerCapabilities {
            tools: ToolsCapabilities { list_changed: false },
        },
        server_info: ServerInfo {
            name: identity.name.clone(),
            version: identity.version.clone(),
        },
        instructions: identity.instructions.clone(),
    })
}

/// Enumerate registered tools in registration order
pub fn list_tools(registry: &ToolRegistry) -> ToolsListResult {
    ToolsListResult::new(registry.list())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::handler_fn;
    use serde_json::json;
    use toolbridge_protocol::tool::object_schema;
    use toolbridge_protocol::{ToolDescriptor, ToolResult};

    #[test]
    fn test_initialize_accepts_any_protocol_version() {
        let identity = ServerIdentity::new("toolbridge-test", "0.0.1").with_instructions("be nice");
        let response = initialize(
            &identity,
            json!({"protocolVersion": "1999-01-01", "clientInfo": {"name": "probe", "version": "1"}}),
        )
        .unwrap();

        assert_eq!(response.protocol_version, MCP_PROTOCOL_VERSION);
        assert_eq!(response.server_info.name, "toolbridge-test");
        assert_eq!(response.instructions.as_deref(), Some("be nice"));
        assert!(!response.capabilities.tools.list_changed);
    }

    #[test]
    fn test_initialize_tolerates_empty_params() {
        let response = initialize(&ServerIdentity::default(), json!({})).unwrap();
        let wire = serde_json::to_value(response).unwrap();
        assert_eq!(wire["serverInfo"]["name"], json!("toolbridge"));
        assert!(wire.get("instructions").is_none());
    }

    #[test]
    fn test_initialize_rejects_non_object_params() {
        assert!(initialize(&ServerIdentity::default(), json!("hello")).is_err());
    }

    #[test]
    fn test_list_tools_text_block_matches_structured_field() {
        let mut builder = ToolRegistry::builder();
        builder
            .register(
                ToolDescriptor::new("echo", "Echo a message", object_schema([("msg", json!({"type": "string"}))])),
                handler_fn(|_| Ok(ToolResult::text("x"))),
            )
            .unwrap();
        let listing = list_tools(&builder.build());

        let from_text: Vec<ToolDescriptor> = serde_json::from_str(&listing.result.joined_text()).unwrap();
        assert_eq!(from_text, listing.tools);
        assert_eq!(listing.tools[0].input_schema["required"], json!(["msg"]));
    }

    #[test]
    fn test_list_tools_on_empty_registry() {
        let listing = list_tools(&ToolRegistry::default());
        assert!(listing.tools.is_empty());
        assert_eq!(listing.result.joined_text(), "[]");
        assert!(!listing.result.is_error);
    }
}
