//! Configuration types for Quarry.
//!
//! Configuration is loaded from an optional YAML file (`quarry.yaml`) and is
//! then overridden by command line flags in the binary.
//!
//! ```yaml
//! upstream:
//!   database_url_env: DATABASE_URL
//! mcp:
//!   transport: http
//!   port: 3000
//! query:
//!   timeout_seconds: 30
//! ```

pub mod mcp;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use mcp::{McpConfig, Transport};
pub use upstream::UpstreamConfig;

/// Complete Quarry configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuarryConfig {
    /// Upstream Postgres connection.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// MCP server settings.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Limits applied to every database round-trip.
    #[serde(default)]
    pub query: QueryConfig,
}

/// Database round-trip limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Abandon a catalog or tool query after this many seconds.
    /// Unset means wait indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl QueryConfig {
    /// The configured timeout as a `Duration`, if any. Zero is treated as unset.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_seconds
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl QuarryConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty file is a valid, all-defaults config.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the database URL or fail with a configuration error.
    pub fn require_database_url(&self) -> Result<String, ConfigError> {
        self.upstream.connection_string().ok_or_else(|| {
            ConfigError::Config(
                "no database URL configured: pass it as an argument, set QUARRY_DATABASE_URL, \
                 or set upstream.database_url in the config file"
                    .to_string(),
            )
        })
    }
}
