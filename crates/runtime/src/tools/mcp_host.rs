//! MCP-backed tool host.

use super::ToolHost;
use crate::Result;
use crate::catalog::ToolCatalog;
use crate::lifecycle::Release;
use mcp::{CallToolResult, ProviderConfig, Session};
use serde_json::{Map, Value};

/// Tool host backed by an MCP provider process.
pub struct McpToolHost {
    session: Session,
    catalog: ToolCatalog,
}

impl McpToolHost {
    /// Spawn the provider, complete the handshake and fetch its catalog.
    ///
    /// The provider is shut down again if the catalog cannot be built.
    pub async fn connect(config: ProviderConfig) -> Result<Self> {
        let session = Session::connect(config).await?;
        let catalog = match fetch_catalog(&session).await {
            Ok(catalog) => catalog,
            Err(e) => {
                session.close().await;
                return Err(e);
            }
        };
        Ok(Self { session, catalog })
    }
}

async fn fetch_catalog(session: &Session) -> Result<ToolCatalog> {
    let tools = session.list_tools().await?;
    ToolCatalog::from_tools(tools)
}

impl ToolHost for McpToolHost {
    fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    async fn execute(&self, name: &str, arguments: Map<String, Value>) -> mcp::Result<CallToolResult> {
        self.session.call_tool(name, arguments).await
    }
}

impl Release for McpToolHost {
    async fn release(&self) {
        self.session.close().await;
    }
}
