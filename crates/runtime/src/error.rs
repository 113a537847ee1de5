use std::time::Duration;

use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Two catalog entries share a name.
    #[error("duplicate tool name: {0}")]
    DuplicateToolName(String),

    #[error("invalid function schema: {0}")]
    InvalidFunctionSchema(String),

    /// The model asked for a tool with arguments that cannot be used.
    #[error("malformed call to {name}: {reason}")]
    MalformedToolCall { name: String, reason: String },

    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("backend error: {0}")]
    Backend(ModelError),

    #[error(transparent)]
    Tool(mcp::Error),
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Timeout(after) => Self::Timeout {
                what: "model response".to_string(),
                after,
            },
            other => Self::Backend(other),
        }
    }
}

impl From<mcp::Error> for Error {
    fn from(e: mcp::Error) -> Self {
        match e {
            mcp::Error::Timeout { method, after } => Self::Timeout {
                what: method,
                after,
            },
            other => Self::Tool(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
