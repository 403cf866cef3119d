//! Wire contract for toolbridge: the JSON-RPC envelope, the tool result
//! payload, MCP handshake types and a socket client.

#[cfg(unix)]
pub mod client;
pub mod jsonrpc;
pub mod mcp;
pub mod tool;

#[cfg(unix)]
pub use client::SocketClient;
pub use jsonrpc::{
    ErrorCode, JsonRpcError, JsonRpcRequest, JsonRpcResponse, MalformedRequest, RequestId, ResponsePayload,
};
pub use tool::{ContentBlock, ToolCallParams, ToolDescriptor, ToolResult, ToolsListResult};
