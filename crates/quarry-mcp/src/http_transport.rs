//! HTTP transport for MCP server.
//!
//! JSON-RPC messages are POSTed to `/mcp`; each request body gets the
//! JSON-RPC response as its body. Concurrent requests queue on the server's
//! session lock.

use crate::error::McpError;
use crate::server::McpServer;
use crate::session::Session;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the HTTP router for MCP.
pub fn create_router<S: Session + 'static>(server: Arc<McpServer<S>>) -> Router {
    Router::new()
        .route("/mcp", post(handle_mcp_post::<S>))
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .with_state(server)
}

/// Handle POST requests to /mcp (JSON-RPC over HTTP).
async fn handle_mcp_post<S: Session + 'static>(
    State(server): State<Arc<McpServer<S>>>,
    body: Bytes,
) -> Response {
    let raw = String::from_utf8_lossy(&body);
    match server.handle_message(&raw).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

/// Handle health check requests.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "quarry",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// HTTP server for MCP transport.
pub struct HttpServer<S> {
    addr: String,
    server: Arc<McpServer<S>>,
}

impl<S: Session + 'static> HttpServer<S> {
    /// Create a new HTTP server.
    pub fn new(addr: impl Into<String>, server: Arc<McpServer<S>>) -> Self {
        Self {
            addr: addr.into(),
            server,
        }
    }

    /// Run the HTTP server.
    pub async fn run(self) -> Result<(), McpError> {
        let app = create_router(self.server);

        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| McpError::StartupFailed(format!("Failed to bind to {}: {}", self.addr, e)))?;

        tracing::info!(addr = %self.addr, "MCP HTTP server listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| McpError::TransportError(e.to_string()))?;

        Ok(())
    }
}
