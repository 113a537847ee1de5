//! Multiplexed JSON-RPC channel over a pair of byte streams.
//!
//! Requests are written as one JSON object per line. A background task reads
//! the other direction and hands each response to the request waiting on its
//! id, so responses may arrive in any order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    Incoming, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, RequestId,
};

type Writer = Arc<Mutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>>;
type Pending = Arc<Mutex<HashMap<RequestId, oneshot::Sender<JsonRpcResponse>>>>;

/// Duplex request/response channel.
pub struct Channel {
    writer: Writer,
    pending: Pending,
    next_id: AtomicI64,
    closed: AtomicBool,
    disconnected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Channel {
    /// Start a channel reading from `reader` and writing to `writer`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let writer: Writer = Arc::new(Mutex::new(Some(Box::new(writer))));
        let pending: Pending = Arc::default();
        let disconnected = Arc::new(AtomicBool::new(false));

        let reader = tokio::spawn(read_loop(
            reader,
            Arc::clone(&pending),
            Arc::clone(&writer),
            Arc::clone(&disconnected),
        ));

        Self {
            writer,
            pending,
            next_id: AtomicI64::new(1),
            closed: AtomicBool::new(false),
            disconnected,
            reader,
        }
    }

    /// Whether the peer is still reachable and the channel is open.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && !self.disconnected.load(Ordering::Acquire)
    }

    /// Send a request and wait up to `limit` for its response.
    pub async fn request<P, R>(&self, method: &str, params: Option<P>, limit: Duration) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let value = self.request_value(method, params, limit).await?;
        serde_json::from_value(value)
            .map_err(|e| Error::Protocol(format!("malformed {method} result: {e}")))
    }

    async fn request_value<P: Serialize>(
        &self,
        method: &str,
        params: Option<P>,
        limit: Duration,
    ) -> Result<Value> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::SessionClosed);
        }

        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(params) = params {
            let params = serde_json::to_value(params)
                .map_err(|e| Error::Protocol(format!("failed to encode {method} params: {e}")))?;
            request = request.with_params(params);
        }

        // Register before writing so a fast response cannot be missed.
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        if self.disconnected.load(Ordering::Acquire) {
            self.pending.lock().await.remove(&id);
            return Err(Error::Channel("provider is not running".into()));
        }

        if let Err(e) = self.send(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }
        trace!(%id, method, "request sent");

        match tokio::time::timeout(limit, rx).await {
            Ok(Ok(response)) => Ok(response.into_result()?),
            Ok(Err(_)) => Err(self.dropped_error()),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::Timeout {
                    method: method.to_string(),
                    after: limit,
                })
            }
        }
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::SessionClosed);
        }
        let mut notification = JsonRpcNotification::new(method);
        notification.params = params;
        self.send(&notification).await
    }

    /// Close the write side and stop reading. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "failed to close provider input");
            }
        }

        // Dropping the senders wakes every waiter with `SessionClosed`.
        self.pending.lock().await.clear();
        self.reader.abort();
    }

    async fn send(&self, message: &impl Serialize) -> Result<()> {
        let line = encode_line(message)?;
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return Err(self.dropped_error());
        };
        write_line(writer, &line).await
    }

    fn dropped_error(&self) -> Error {
        if self.closed.load(Ordering::Acquire) {
            Error::SessionClosed
        } else {
            Error::Channel("provider exited before responding".into())
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn encode_line(message: &impl Serialize) -> Result<String> {
    let mut line = serde_json::to_string(message)
        .map_err(|e| Error::Protocol(format!("failed to encode message: {e}")))?;
    line.push('\n');
    Ok(line)
}

async fn write_line(writer: &mut Box<dyn AsyncWrite + Send + Unpin>, line: &str) -> Result<()> {
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| Error::Channel(format!("failed to write to provider: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| Error::Channel(format!("failed to flush provider input: {e}")))
}

async fn read_loop<R>(reader: R, pending: Pending, writer: Writer, disconnected: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                debug!("provider closed its output");
                break;
            }
            Ok(_) => match std::str::from_utf8(&buf) {
                Ok(line) => dispatch(line.trim(), &pending, &writer).await,
                Err(_) => debug!(
                    line = %String::from_utf8_lossy(&buf).trim_end(),
                    "skipping non-protocol output"
                ),
            },
            Err(e) => {
                warn!(error = %e, "failed to read from provider");
                break;
            }
        }
    }

    disconnected.store(true, Ordering::Release);
    pending.lock().await.clear();
}

async fn dispatch(line: &str, pending: &Pending, writer: &Writer) {
    if line.is_empty() {
        return;
    }

    let message: Incoming = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(_) => {
            debug!(line, "skipping non-protocol output");
            return;
        }
    };

    match message {
        Incoming::Response(response) => {
            let waiter = pending.lock().await.remove(&response.id);
            match waiter {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => warn!(id = %response.id, "response for unknown request"),
            }
        }
        Incoming::Notification(notification) => {
            debug!(method = %notification.method, "provider notification");
        }
        Incoming::Request { id, method, .. } => {
            let reply = if method == "ping" {
                JsonRpcResponse::success(id, json!({}))
            } else {
                JsonRpcResponse::failure(
                    id,
                    METHOD_NOT_FOUND,
                    format!("client does not handle {method}"),
                )
            };
            let Ok(line) = encode_line(&reply) else {
                return;
            };
            if let Some(writer) = writer.lock().await.as_mut() {
                if let Err(e) = write_line(writer, &line).await {
                    debug!(error = %e, "failed to answer provider request");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{DuplexStream, Lines, ReadHalf, WriteHalf};

    const LIMIT: Duration = Duration::from_secs(5);

    struct FakeProvider {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeProvider {
        async fn next(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }

        async fn send(&mut self, message: Value) {
            let mut line = message.to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        async fn reply(&mut self, id: &Value, result: Value) {
            self.send(json!({"jsonrpc": "2.0", "id": id, "result": result}))
                .await;
        }
    }

    fn harness() -> (Channel, FakeProvider) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let (client_r, client_w) = tokio::io::split(client);
        let (server_r, server_w) = tokio::io::split(server);
        let provider = FakeProvider {
            lines: BufReader::new(server_r).lines(),
            writer: server_w,
        };
        (Channel::new(client_r, client_w), provider)
    }

    #[tokio::test]
    async fn responses_are_matched_by_id() {
        let (channel, mut provider) = harness();

        let first = channel.request::<_, Value>("echo", Some(json!({"tag": "first"})), LIMIT);
        let second = channel.request::<_, Value>("echo", Some(json!({"tag": "second"})), LIMIT);
        let serve = async {
            let a = provider.next().await;
            let b = provider.next().await;
            // Answer in reverse submission order.
            provider.reply(&b["id"], json!({"tag": b["params"]["tag"]})).await;
            provider.reply(&a["id"], json!({"tag": a["params"]["tag"]})).await;
        };

        let (first, second, ()) = tokio::join!(first, second, serve);
        assert_eq!(first.unwrap()["tag"], "first");
        assert_eq!(second.unwrap()["tag"], "second");
    }

    #[tokio::test]
    async fn skips_non_protocol_lines() {
        let (channel, mut provider) = harness();

        let request = channel.request::<(), Value>("tools/list", None, LIMIT);
        let serve = async {
            let req = provider.next().await;
            provider.writer.write_all(b"starting up...\n\n").await.unwrap();
            provider
                .send(json!({"jsonrpc": "2.0", "method": "notifications/message"}))
                .await;
            provider.reply(&req["id"], json!({"tools": []})).await;
        };

        let (result, ()) = tokio::join!(request, serve);
        assert_eq!(result.unwrap(), json!({"tools": []}));
    }

    #[tokio::test]
    async fn skips_lines_that_are_not_utf8() {
        let (channel, mut provider) = harness();

        let request = channel.request::<(), Value>("tools/list", None, LIMIT);
        let serve = async {
            let req = provider.next().await;
            provider.writer.write_all(b"log \xff\xfe garbage\n").await.unwrap();
            provider.reply(&req["id"], json!({"tools": []})).await;
        };

        let (result, ()) = tokio::join!(request, serve);
        assert_eq!(result.unwrap(), json!({"tools": []}));
        assert!(channel.is_connected());
    }

    #[tokio::test]
    async fn error_response_is_rpc_error() {
        let (channel, mut provider) = harness();

        let request = channel.request::<(), Value>("nope", None, LIMIT);
        let serve = async {
            let req = provider.next().await;
            provider
                .send(json!({
                    "jsonrpc": "2.0",
                    "id": req["id"],
                    "error": {"code": -32601, "message": "Method not found"}
                }))
                .await;
        };

        let (result, ()) = tokio::join!(request, serve);
        match result {
            Err(Error::Rpc(err)) => assert_eq!(err.code, -32601),
            other => panic!("expected rpc error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn answers_provider_ping() {
        let (_channel, mut provider) = harness();

        provider
            .send(json!({"jsonrpc": "2.0", "id": "srv-1", "method": "ping"}))
            .await;
        let reply = provider.next().await;
        assert_eq!(reply["id"], "srv-1");
        assert_eq!(reply["result"], json!({}));

        provider
            .send(json!({"jsonrpc": "2.0", "id": "srv-2", "method": "sampling/createMessage"}))
            .await;
        let reply = provider.next().await;
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn request_times_out() {
        let (channel, mut provider) = harness();

        let request = channel.request::<(), Value>("slow", None, Duration::from_millis(50));
        let serve = async {
            provider.next().await;
        };

        let (result, ()) = tokio::join!(request, serve);
        assert!(matches!(result, Err(Error::Timeout { ref method, .. }) if method == "slow"));
        assert!(channel.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn provider_exit_is_channel_error() {
        let (channel, provider) = harness();
        drop(provider);

        let result = channel.request::<(), Value>("tools/list", None, LIMIT).await;
        assert!(matches!(result, Err(Error::Channel(_))));
    }

    #[tokio::test]
    async fn closed_channel_rejects_requests() {
        let (channel, _provider) = harness();
        channel.close().await;
        channel.close().await;

        assert!(!channel.is_connected());
        let result = channel.request::<(), Value>("tools/list", None, LIMIT).await;
        assert!(matches!(result, Err(Error::SessionClosed)));
        let result = channel.notify("notifications/initialized", None).await;
        assert!(matches!(result, Err(Error::SessionClosed)));
    }
}
