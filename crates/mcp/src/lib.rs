//! MCP (Model Context Protocol) client library.
//!
//! This crate launches a tool provider as a subprocess and talks to it over
//! stdio with line-delimited JSON-RPC.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{ProviderConfig, Session};
//! use serde_json::{Map, json};
//!
//! # async fn example() -> mcp::Result<()> {
//! let session = Session::connect(ProviderConfig::new("./math_server.py")).await?;
//!
//! let tools = session.list_tools().await?;
//! for tool in &tools {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let mut args = Map::new();
//! args.insert("a".into(), json!(3));
//! args.insert("b".into(), json!(4));
//! let result = session.call_tool("add", args).await?;
//! println!("{}", result.joined_text());
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod provider;
mod session;
mod transport;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ListToolsResult, METHOD_NOT_FOUND,
    PROTOCOL_VERSION, RequestId, ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use provider::{DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_TIMEOUT, ProviderConfig, ProviderKind};
pub use session::Session;
pub use transport::Channel;
