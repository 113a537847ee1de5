//! Provider session management (spawn, handshake, calls, teardown).

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, ListToolsParams,
    ListToolsResult, Tool,
};
use crate::provider::{ProviderConfig, ProviderKind};
use crate::transport::Channel;

/// How long a closed provider gets to exit before it is killed.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Upper bound on `tools/list` pages, guarding against a cursor loop.
const MAX_LIST_PAGES: usize = 64;

/// An initialized session with a running tool provider.
pub struct Session {
    kind: ProviderKind,
    process: Mutex<Option<Child>>,
    channel: Channel,
    server_info: InitializeResult,
    known_tools: Mutex<Vec<String>>,
    initialized: AtomicBool,
    closed: AtomicBool,
    request_timeout: Duration,
}

impl Session {
    /// Spawn the provider and perform the `initialize` handshake.
    #[instrument(skip_all, fields(path = %config.path.display()))]
    pub async fn connect(config: ProviderConfig) -> Result<Self> {
        let kind = config.resolve_kind()?;
        let mut cmd = config.command(kind)?;
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut process = cmd.spawn()?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        let channel = Channel::new(stdout, stdin);
        debug!(%kind, pid = ?process.id(), "provider spawned");

        let server_info = match handshake(&channel, config.handshake_timeout).await {
            Ok(info) => info,
            Err(e) => {
                channel.close().await;
                let _ = process.kill().await;
                return Err(Error::HandshakeFailure(e.to_string()));
            }
        };

        info!(
            server = %server_info.server_info.name,
            protocol = %server_info.protocol_version,
            "provider initialized"
        );
        if let Some(instructions) = &server_info.instructions {
            debug!(%instructions, "provider instructions");
        }

        Ok(Self {
            kind,
            process: Mutex::new(Some(process)),
            channel,
            server_info,
            known_tools: Mutex::new(Vec::new()),
            initialized: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            request_timeout: config.request_timeout,
        })
    }

    /// The kind the provider was launched as.
    pub fn kind(&self) -> ProviderKind {
        self.kind
    }

    /// Server info returned by the handshake.
    pub fn server_info(&self) -> &InitializeResult {
        &self.server_info
    }

    /// Whether the handshake completed and the session is still open.
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Whether the provider process is still reachable.
    pub fn is_running(&self) -> bool {
        self.channel.is_connected()
    }

    /// Fetch the provider's tools, following pagination.
    ///
    /// The returned names become the set [`Session::call_tool`] accepts.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        self.ensure_open()?;

        let tools = list_all_tools(&self.channel, self.request_timeout).await?;
        *self.known_tools.lock().await = tools.iter().map(|t| t.name.clone()).collect();
        debug!(count = tools.len(), "listed tools");
        Ok(tools)
    }

    /// Call a tool from the last-fetched list.
    #[instrument(skip(self, arguments))]
    pub async fn call_tool(&self, name: &str, arguments: Map<String, Value>) -> Result<CallToolResult> {
        self.ensure_open()?;

        if !self.known_tools.lock().await.iter().any(|known| known == name) {
            return Err(Error::ToolNotFound(name.to_string()));
        }

        let params = CallToolParams {
            name: name.to_string(),
            arguments: Some(arguments),
        };

        let result: CallToolResult = self
            .channel
            .request("tools/call", Some(params), self.request_timeout)
            .await
            .map_err(|e| match e {
                Error::Rpc(err) => Error::ToolExecution {
                    name: name.to_string(),
                    message: err.message,
                },
                other => other,
            })?;

        if result.is_error {
            return Err(Error::ToolExecution {
                name: name.to_string(),
                message: result.joined_text(),
            });
        }

        Ok(result)
    }

    /// Terminate the provider and release the channel. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.initialized.store(false, Ordering::Release);
        self.channel.close().await;

        let Some(mut process) = self.process.lock().await.take() else {
            return;
        };
        match timeout(SHUTDOWN_GRACE, process.wait()).await {
            Ok(Ok(status)) => debug!(%status, "provider exited"),
            Ok(Err(e)) => debug!(error = %e, "failed to wait for provider"),
            Err(_) => {
                if let Err(e) = process.kill().await {
                    debug!(error = %e, "failed to kill provider");
                }
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }
}

async fn handshake(channel: &Channel, limit: Duration) -> Result<InitializeResult> {
    let result: InitializeResult = channel
        .request("initialize", Some(InitializeParams::default()), limit)
        .await?;
    channel.notify("notifications/initialized", None).await?;
    Ok(result)
}

/// Follow `nextCursor` until the provider reports the last page.
async fn list_all_tools(channel: &Channel, limit: Duration) -> Result<Vec<Tool>> {
    let mut tools = Vec::new();
    let mut cursor = None;
    for _ in 0..MAX_LIST_PAGES {
        let params = ListToolsParams { cursor };
        let page: ListToolsResult = channel
            .request("tools/list", Some(params), limit)
            .await
            .map_err(protocol_error)?;
        tools.extend(page.tools);

        cursor = page.next_cursor;
        if cursor.is_none() {
            return Ok(tools);
        }
    }
    Err(Error::Protocol(format!(
        "tools/list still paginating after {MAX_LIST_PAGES} pages"
    )))
}

/// Listing failures that are the provider's fault are protocol errors.
fn protocol_error(e: Error) -> Error {
    match e {
        Error::Rpc(err) => Error::Protocol(err.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    const LIMIT: Duration = Duration::from_secs(5);

    /// Serve `tools/list` pages from `next_page` until the client stops asking.
    fn paginating_channel(
        next_page: impl Fn(u64, Option<&str>) -> Value + Send + 'static,
    ) -> Channel {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (client_r, client_w) = tokio::io::split(client);
        let (server_r, mut server_w) = tokio::io::split(server);

        tokio::spawn(async move {
            let mut lines = BufReader::new(server_r).lines();
            let mut served = 0;
            while let Ok(Some(line)) = lines.next_line().await {
                let request: Value = serde_json::from_str(&line).unwrap();
                served += 1;
                let cursor = request["params"]["cursor"].as_str();
                let reply = json!({
                    "jsonrpc": "2.0",
                    "id": request["id"],
                    "result": next_page(served, cursor),
                });
                let mut out = reply.to_string();
                out.push('\n');
                if server_w.write_all(out.as_bytes()).await.is_err() {
                    break;
                }
            }
        });

        Channel::new(client_r, client_w)
    }

    fn tool(name: &str) -> Value {
        json!({"name": name, "inputSchema": {"type": "object"}})
    }

    #[tokio::test]
    async fn follows_cursor_to_last_page() {
        let channel = paginating_channel(|_, cursor| match cursor {
            None => json!({"tools": [tool("add")], "nextCursor": "page-2"}),
            Some(_) => json!({"tools": [tool("multiply")]}),
        });

        let tools = list_all_tools(&channel, LIMIT).await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["add", "multiply"]);
    }

    #[tokio::test]
    async fn endless_cursor_is_protocol_error() {
        let channel = paginating_channel(|served, _| {
            json!({"tools": [tool(&format!("tool_{served}"))], "nextCursor": "again"})
        });

        let err = list_all_tools(&channel, LIMIT).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(ref msg) if msg.contains("pages")));
    }
}
