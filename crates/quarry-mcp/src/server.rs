//! MCP server implementation.
//!
//! The server owns the single database session and routes each request to
//! its handler. Handlers lock the session for their whole database
//! interaction, so at most one statement is ever in flight on it.

use crate::catalog::Catalog;
use crate::error::McpError;
use crate::http_transport::HttpServer;
use crate::protocol::*;
use crate::query::QueryGate;
use crate::resource::{RESOURCE_MIME_TYPE, ResourceBase};
use crate::session::Session;
use crate::tools::{self, ToolCall};
use quarry_core::config::{McpConfig, Transport};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// MCP protocol revision spoken by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// The MCP server.
pub struct McpServer<S> {
    session: Arc<Mutex<S>>,
    resources: ResourceBase,
    catalog: Catalog,
    gate: QueryGate,
}

impl<S: Session + 'static> McpServer<S> {
    /// Create a server around an open session.
    pub fn new(session: S, resources: ResourceBase) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            resources,
            catalog: Catalog::default(),
            gate: QueryGate::default(),
        }
    }

    /// Bound every database round-trip by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.catalog = Catalog::new(timeout);
        self.gate = QueryGate::new(timeout);
        self
    }

    /// Take the session back once no other handle to it remains.
    pub fn into_session(self) -> Option<S> {
        Arc::try_unwrap(self.session).ok().map(Mutex::into_inner)
    }

    /// Serve on the configured transport until the input closes.
    pub async fn run(self: Arc<Self>, config: &McpConfig) -> Result<(), McpError> {
        match config.transport {
            Transport::Stdio => self.run_stdio().await,
            Transport::Http => HttpServer::new(config.bind_addr(), self).run().await,
        }
    }

    /// Run the server with stdio transport: one JSON-RPC message per line.
    pub async fn run_stdio(&self) -> Result<(), McpError> {
        tracing::info!("Starting MCP server with stdio transport");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_message(&line).await {
                let mut payload = serde_json::to_vec(&response)?;
                payload.push(b'\n');
                stdout.write_all(&payload).await?;
                stdout.flush().await?;
            }
        }

        tracing::info!("stdin closed, stopping MCP server");
        Ok(())
    }

    /// Handle one raw message. Parse failures get a `-32700` response.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                return Some(JsonRpcResponse::from_error(None, &McpError::Parse(e.to_string())));
            }
        };
        let id = value.get("id").cloned();

        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle_request(request).await,
            Err(e) => Some(JsonRpcResponse::from_error(
                id,
                &McpError::InvalidRequest(e.to_string()),
            )),
        }
    }

    /// Handle a JSON-RPC request. Notifications yield no response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let id = request.id.clone();
        let notification = request.is_notification();

        let result = match McpRequest::parse(&request.method, request.params) {
            Ok(parsed) => {
                tracing::debug!(method = parsed.method(), "Dispatching request");
                self.dispatch(parsed).await
            }
            Err(e) => Err(e),
        };

        if notification {
            if let Err(e) = result {
                tracing::debug!(method = %request.method, error = %e, "Ignoring failed notification");
            }
            return None;
        }

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => {
                tracing::debug!(method = %request.method, code = e.code(), error = %e, "Request failed");
                JsonRpcResponse::from_error(id, &e)
            }
        })
    }

    /// Run the handler for a parsed request.
    pub async fn dispatch(&self, request: McpRequest) -> Result<Value, McpError> {
        match request {
            McpRequest::Initialize => Ok(self.handle_initialize()),
            McpRequest::Initialized | McpRequest::Ping => Ok(json!({})),
            McpRequest::ListResources => Ok(serde_json::to_value(self.list_resources().await?)?),
            McpRequest::ReadResource(params) => Ok(serde_json::to_value(self.read_resource(params).await?)?),
            McpRequest::ListTools => Ok(serde_json::to_value(self.list_tools())?),
            McpRequest::CallTool(params) => Ok(serde_json::to_value(self.call_tool(params).await?)?),
        }
    }

    fn handle_initialize(&self) -> Value {
        let result = InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            server_info: ServerInfo {
                name: "quarry".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: json!({
                "resources": {},
                "tools": {}
            }),
        };
        json!(result)
    }

    /// One resource per table in the `public` schema.
    pub async fn list_resources(&self) -> Result<ListResourcesResponse, McpError> {
        let tables = {
            let mut session = self.session.lock().await;
            self.catalog.list_tables(&mut *session).await?
        };

        // A table whose name cannot be addressed is left out, not fatal.
        let resources = tables
            .iter()
            .filter_map(|table| match self.resources.resource(table) {
                Ok(resource) => Some(resource),
                Err(e) => {
                    tracing::warn!(table = %table, error = %e, "Skipping table without a resource URI");
                    None
                }
            })
            .collect();
        Ok(ListResourcesResponse { resources })
    }

    /// The column list of the table named by `params.uri`.
    pub async fn read_resource(&self, params: ReadResourceParams) -> Result<ReadResourceResponse, McpError> {
        let table = ResourceBase::decode(&params.uri)?;
        let columns = {
            let mut session = self.session.lock().await;
            self.catalog.list_columns(&mut *session, &table).await?
        };

        Ok(ReadResourceResponse {
            contents: vec![ResourceContents {
                uri: params.uri,
                mime_type: RESOURCE_MIME_TYPE.to_string(),
                text: serde_json::to_string_pretty(&columns)?,
            }],
        })
    }

    /// The static tool list.
    pub fn list_tools(&self) -> ListToolsResponse {
        ListToolsResponse {
            tools: tools::definitions(),
        }
    }

    /// Run a tool. Query failures propagate as errors after the rollback.
    pub async fn call_tool(&self, params: CallToolParams) -> Result<CallToolResponse, McpError> {
        match ToolCall::parse(&params)? {
            ToolCall::Query { sql } => {
                let rows = {
                    let mut session = self.session.lock().await;
                    self.gate.execute(&mut *session, &sql).await?
                };

                Ok(CallToolResponse {
                    content: vec![ToolContent::Text {
                        text: serde_json::to_string_pretty(&rows)?,
                    }],
                    is_error: false,
                })
            }
        }
    }
}
