//! Tool host trait.

use crate::catalog::ToolCatalog;
use mcp::CallToolResult;
use serde_json::{Map, Value};
use std::future::Future;

/// Trait for tool execution hosts.
///
/// Implementations provide the tool catalog and execute tool calls.
/// This is the boundary between the model loop and side effects.
pub trait ToolHost: Send + Sync {
    /// The catalog advertised to the model.
    fn catalog(&self) -> &ToolCatalog;

    /// Execute a tool call.
    fn execute(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = mcp::Result<CallToolResult>> + Send;
}
