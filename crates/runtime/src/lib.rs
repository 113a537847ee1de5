//! toolchat runtime: model backends, tool orchestration and the chat loop.
//!
//! # Overview
//!
//! - **Backend**: a trait over chat-completion providers; [`OpenAiBackend`]
//!   talks to any OpenAI-compatible endpoint such as Ollama.
//! - **ToolHost**: the tool catalog plus a way to execute calls;
//!   [`McpToolHost`] is backed by an MCP provider process.
//! - **QueryProcessor**: one user utterance in, one composed answer out.
//! - **repl**: the interactive loop feeding queries to a [`QueryHandler`].
//! - **lifecycle**: at-most-once release of the provider on every exit path.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use runtime::{ChatCompletionsConfig, McpToolHost, OpenAiBackend, QueryProcessor};
//!
//! # async fn example() -> runtime::Result<()> {
//! let host = Arc::new(McpToolHost::connect(mcp::ProviderConfig::new("math_server.py")).await?);
//! let backend = OpenAiBackend::new(ChatCompletionsConfig::default())?;
//!
//! let processor = QueryProcessor::new(backend, Arc::clone(&host));
//! println!("{}", processor.process("What is 3 + 4?").await?);
//! # Ok(())
//! # }
//! ```

pub mod catalog;
mod error;
pub mod lifecycle;
pub mod model;
mod providers;
pub mod query;
pub mod repl;
pub mod tools;

pub use catalog::{ToolCatalog, ToolDefinition};
pub use error::{Error, Result};
pub use lifecycle::{Exit, Release, Scoped, run_scoped};
pub use model::{Backend, Message, ModelError, ModelRequest, ModelResponse, ToolCall, ToolSpec};
pub use providers::{
    ChatCompletionsConfig, DEFAULT_API_KEY, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TEMPERATURE,
    OpenAiBackend,
};
pub use query::{QueryOptions, QueryProcessor};
pub use repl::{EXIT_COMMAND, LoopState, QueryHandler};
pub use tools::{McpToolHost, ToolHost};
