//! Tool-provider launch configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Default timeout for provider requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for the `initialize` handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// How a provider program is run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// A Python script run by the configured interpreter.
    Python,
    /// A JavaScript file run by the configured Node runtime.
    Node,
    /// A program run directly.
    Executable,
}

impl ProviderKind {
    /// Detect the kind of the program at `path`.
    pub fn detect(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(unsupported(path, "not a file"));
        }

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("py") => Ok(Self::Python),
            Some("js" | "mjs" | "cjs") => Ok(Self::Node),
            _ if is_executable(path) => Ok(Self::Executable),
            _ => Err(unsupported(
                path,
                "expected a .py or .js script or an executable file",
            )),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Node => write!(f, "node"),
            Self::Executable => write!(f, "executable"),
        }
    }
}

/// Configuration for launching a tool provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Path to the provider program or script.
    pub path: PathBuf,
    /// Explicit kind; detected from `path` when `None`.
    pub kind: Option<ProviderKind>,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    /// Interpreter used for [`ProviderKind::Python`].
    pub python: String,
    /// Runtime used for [`ProviderKind::Node`].
    pub node: String,
    pub handshake_timeout: Duration,
    pub request_timeout: Duration,
}

impl ProviderConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
            args: Vec::new(),
            env: HashMap::new(),
            python: "python".to_string(),
            node: "node".to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Resolve the provider kind, preferring the explicit setting.
    pub fn resolve_kind(&self) -> Result<ProviderKind> {
        match self.kind {
            Some(kind) if self.path.is_file() => Ok(kind),
            Some(_) => Err(unsupported(&self.path, "not a file")),
            None => ProviderKind::detect(&self.path),
        }
    }

    /// Build the command that launches this provider.
    pub fn command(&self, kind: ProviderKind) -> Result<Command> {
        let mut cmd = match kind {
            ProviderKind::Python => self.interpreted(&self.python)?,
            ProviderKind::Node => self.interpreted(&self.node)?,
            ProviderKind::Executable => Command::new(&self.path),
        };
        cmd.args(&self.args).envs(&self.env);
        Ok(cmd)
    }

    fn interpreted(&self, interpreter: &str) -> Result<Command> {
        let program = which::which(interpreter).map_err(|e| {
            unsupported(&self.path, format!("interpreter `{interpreter}` not found: {e}"))
        })?;
        let mut cmd = Command::new(program);
        cmd.arg(&self.path);
        Ok(cmd)
    }
}

fn unsupported(path: &Path, reason: impl Into<String>) -> Error {
    Error::UnsupportedProviderKind {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
}
