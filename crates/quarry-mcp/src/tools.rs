//! Tools exposed by the server.
//!
//! The set of tools is closed: adding one means adding a [`Tool`] variant,
//! and every `match` over it must then handle the new tool.

use crate::error::McpError;
use crate::protocol::{CallToolParams, ToolDefinition};
use serde_json::{Value, json};
use std::sync::LazyLock;

static QUERY_TOOL: LazyLock<ToolDefinition> = LazyLock::new(|| ToolDefinition {
    name: Tool::Query.name().to_string(),
    description: Some("Run a read-only SQL query".to_string()),
    input_schema: json!({
        "type": "object",
        "properties": {
            "sql": { "type": "string" }
        }
    }),
});

/// A tool the server can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    /// Run caller-supplied SQL.
    Query,
}

impl Tool {
    /// Every tool, in listing order.
    pub const ALL: [Tool; 1] = [Tool::Query];

    pub fn name(self) -> &'static str {
        match self {
            Tool::Query => "query",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// The static descriptor advertised by `tools/list`.
    pub fn definition(self) -> &'static ToolDefinition {
        match self {
            Tool::Query => &QUERY_TOOL,
        }
    }
}

/// All tool descriptors.
pub fn definitions() -> Vec<ToolDefinition> {
    Tool::ALL.iter().map(|tool| tool.definition().clone()).collect()
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Query { sql: String },
}

impl ToolCall {
    /// Resolve the tool by name and extract its arguments.
    pub fn parse(params: &CallToolParams) -> Result<Self, McpError> {
        let tool = Tool::from_name(&params.name).ok_or_else(|| McpError::UnknownTool {
            name: params.name.clone(),
        })?;

        match tool {
            Tool::Query => {
                let sql = params
                    .arguments
                    .get("sql")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::InvalidArguments {
                        tool: tool.name().to_string(),
                        reason: "`sql` must be a string".to_string(),
                    })?;
                Ok(ToolCall::Query { sql: sql.to_string() })
            }
        }
    }
}
