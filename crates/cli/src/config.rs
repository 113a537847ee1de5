//! Configuration loading from toolchat.toml.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mcp::{ProviderConfig, ProviderKind};
use runtime::{ChatCompletionsConfig, QueryOptions};
use serde::Deserialize;

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "toolchat.toml";

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "TOOLCHAT_CONFIG";
pub const MODEL_ENV: &str = "TOOLCHAT_MODEL";
pub const BASE_URL_ENV: &str = "TOOLCHAT_BASE_URL";

/// Top-level configuration.
#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Chat completions endpoint.
    pub backend: ChatCompletionsConfig,

    /// How the tool provider is launched.
    pub provider: ProviderSection,

    pub query: QueryOptions,
}

/// Provider launch settings.
#[derive(Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderSection {
    /// Skips detection from the file name when set.
    pub kind: Option<ProviderKind>,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub python: String,
    pub node: String,
    pub handshake_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for ProviderSection {
    fn default() -> Self {
        let defaults = ProviderConfig::new("");
        Self {
            kind: None,
            args: Vec::new(),
            env: HashMap::new(),
            python: defaults.python,
            node: defaults.node,
            handshake_timeout_secs: defaults.handshake_timeout.as_secs(),
            request_timeout_secs: defaults.request_timeout.as_secs(),
        }
    }
}

impl ProviderSection {
    /// Launch settings for the provider at `path`.
    pub fn to_provider_config(&self, path: impl Into<PathBuf>) -> ProviderConfig {
        ProviderConfig {
            kind: self.kind,
            args: self.args.clone(),
            env: self.env.clone(),
            python: self.python.clone(),
            node: self.node.clone(),
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ProviderConfig::new(path)
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the effective configuration.
    ///
    /// `TOOLCHAT_CONFIG` must point at a readable file when set; the default
    /// `toolchat.toml` is optional. Environment overrides apply last.
    pub fn discover() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path)?,
            None if Path::new(CONFIG_FILE).is_file() => Self::load(CONFIG_FILE)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `TOOLCHAT_MODEL` and `TOOLCHAT_BASE_URL` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|value: &String| !value.trim().is_empty());
        if let Some(model) = non_empty(MODEL_ENV) {
            self.backend.model = model;
        }
        if let Some(base_url) = non_empty(BASE_URL_ENV) {
            self.backend.base_url = base_url;
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),
}
