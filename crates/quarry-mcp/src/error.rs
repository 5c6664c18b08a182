//! Error types for the MCP crate.

use crate::protocol::{INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};
use std::time::Duration;
use thiserror::Error;

/// A resource URI (or the database URL it is derived from) is malformed.
#[derive(Debug, Error)]
pub enum AddressError {
    /// The URI does not end in `<table>/schema`.
    #[error("Invalid resource URI {uri:?}: {reason}")]
    InvalidResourceUri { uri: String, reason: &'static str },

    /// The database URL cannot serve as a resource base.
    #[error("invalid database URL: {0}")]
    InvalidDatabaseUrl(String),
}

/// An `information_schema` query failed.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog query failed: {0}")]
    QueryFailed(#[source] sqlx::Error),

    #[error("catalog query returned an unexpected row: {0}")]
    UnexpectedRow(String),

    #[error("catalog query timed out after {0:?}")]
    Timeout(Duration),
}

/// A caller-supplied query failed.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Failed(#[from] sqlx::Error),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that can occur in the MCP server.
#[derive(Debug, Error)]
pub enum McpError {
    /// Failed to start the server.
    #[error("failed to start MCP server: {0}")]
    StartupFailed(String),

    /// The message is not valid JSON.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The message is JSON but not a JSON-RPC request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No handler for the method.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// Params missing or of the wrong shape.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Tool not found.
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    /// Invalid arguments for tool.
    #[error("invalid arguments for tool {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Query(#[from] QueryError),

    /// Transport error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl McpError {
    /// JSON-RPC error code reported for this error.
    pub fn code(&self) -> i32 {
        match self {
            McpError::Parse(_) => PARSE_ERROR,
            McpError::InvalidRequest(_) => INVALID_REQUEST,
            McpError::MethodNotFound(_) => METHOD_NOT_FOUND,
            McpError::InvalidParams(_)
            | McpError::UnknownTool { .. }
            | McpError::InvalidArguments { .. }
            | McpError::Address(_) => INVALID_PARAMS,
            McpError::StartupFailed(_)
            | McpError::Catalog(_)
            | McpError::Query(_)
            | McpError::TransportError(_)
            | McpError::SerializationError(_)
            | McpError::IoError(_) => INTERNAL_ERROR,
        }
    }
}
