//! CLI command implementations for the Quarry MCP server.

pub mod serve;
