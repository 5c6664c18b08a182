//! Shared types for the Quarry workspace.
//!
//! Right now this is only configuration: where the upstream Postgres lives,
//! which MCP transport to serve on, and how long a database round-trip may
//! take before it is abandoned.

// Configuration types shared across all Quarry crates
pub mod config;

// Re-export commonly used config types for convenience
pub use config::{ConfigError, McpConfig, QueryConfig, QuarryConfig, Transport, UpstreamConfig};
