//! MCP error types.

use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::JsonRpcError;
use thiserror::Error;

/// Errors raised by a provider session.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The provider path cannot be run under any known provider kind.
    #[error("unsupported provider {}: {reason}", path.display())]
    UnsupportedProviderKind { path: PathBuf, reason: String },

    #[error("failed to spawn provider: {0}")]
    Spawn(#[from] std::io::Error),

    /// The provider did not complete the `initialize` exchange.
    #[error("handshake failed: {0}")]
    HandshakeFailure(String),

    /// The provider sent something that does not fit the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("session closed")]
    SessionClosed,

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// The provider reported an application-level failure for a tool call.
    #[error("tool {name} failed: {message}")]
    ToolExecution { name: String, message: String },

    /// The subprocess exited or the pipe broke.
    #[error("channel error: {0}")]
    Channel(String),

    #[error("timeout after {after:?} waiting for {method}")]
    Timeout { method: String, after: Duration },

    #[error("JSON-RPC error: {0}")]
    Rpc(#[from] JsonRpcError),
}

pub type Result<T> = std::result::Result<T, Error>;
