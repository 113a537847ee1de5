//! CLI error types.

use crate::config::ConfigError;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Configuration could not be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An I/O error occurred on the terminal.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<runtime::ModelError> for Error {
    fn from(e: runtime::ModelError) -> Self {
        Self::Runtime(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
