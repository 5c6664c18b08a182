//! Upstream database configuration types.
//!
//! Two configuration methods are supported, in order of precedence:
//! 1. `database_url_env` - reference an environment variable
//! 2. `database_url` - provide the URL directly

use serde::{Deserialize, Serialize};

/// Configuration for the upstream Postgres connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Environment variable name containing the PostgreSQL connection URL.
    /// Highest precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url_env: Option<String>,

    /// Full PostgreSQL connection URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl UpstreamConfig {
    /// Resolve the PostgreSQL connection string, if one is configured.
    ///
    /// An env var that is named but unset (or empty) falls through to
    /// `database_url`.
    pub fn connection_string(&self) -> Option<String> {
        if let Some(env_var) = &self.database_url_env
            && let Ok(url) = std::env::var(env_var)
            && !url.trim().is_empty()
        {
            return Some(url);
        }

        self.database_url
            .as_ref()
            .filter(|url| !url.trim().is_empty())
            .cloned()
    }
}
