//! Tool execution and MCP integration.

mod host;
mod mcp_host;

pub use host::ToolHost;
pub use mcp_host::McpToolHost;
