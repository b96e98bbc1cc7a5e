//! Tool-call dispatch.
//!
//! Every call goes through the same sequence: look the tool up, validate its
//! arguments, make sure the database connection is usable, run the tool and
//! wrap the result in a [`ToolResponse`].

use crate::constants::GENERIC_OPERATION_ERROR;
use crate::database::ConnectionManager;
use crate::security::redact_credentials;
use crate::tools::{ToolOutcome, ToolRegistry};
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// A tool as advertised to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Map<String, Value>,
}

/// One text block of a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

/// The envelope returned for every tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResponse {
    pub content: Vec<TextContent>,

    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolResponse {
    fn text(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            content: vec![TextContent {
                kind: "text",
                text: text.into(),
            }],
            is_error,
        }
    }

    /// A non-error response carrying the pretty-printed outcome.
    pub fn outcome(outcome: &ToolOutcome) -> Self {
        match serde_json::to_string_pretty(outcome) {
            Ok(text) => Self::text(text, false),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool outcome");
                Self::error(GENERIC_OPERATION_ERROR)
            }
        }
    }

    /// An error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::text(message, true)
    }

    /// Concatenated text of all content blocks.
    pub fn text_content(&self) -> String {
        self.content
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<ToolResponse> for CallToolResult {
    fn from(response: ToolResponse) -> Self {
        let content = response
            .content
            .into_iter()
            .map(|c| Content::text(c.text))
            .collect();
        if response.is_error {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }
}

/// Routes tool calls through validation and the connection precondition.
pub struct Dispatcher {
    registry: ToolRegistry,
    connections: Arc<ConnectionManager>,
    read_only: bool,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, connections: Arc<ConnectionManager>, read_only: bool) -> Self {
        Self {
            registry,
            connections,
            read_only,
        }
    }

    /// Whether write tools are hidden.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// The connection manager, for shutdown.
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Tools visible in the current mode, in listing order.
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.registry
            .visible(self.read_only)
            .into_iter()
            .map(|tool| ToolDefinition {
                name: tool.name(),
                description: tool.description(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Run one tool call. Missing or null arguments are treated as `{}`.
    #[instrument(skip(self, args))]
    pub async fn dispatch(&self, name: &str, args: Option<Value>) -> ToolResponse {
        let tool = match self.registry.get(name) {
            Some(tool) if self.registry.is_visible(name, self.read_only) => Arc::clone(tool),
            _ => {
                warn!("Unknown tool requested");
                return ToolResponse::error(format!("Unknown tool: {}", name));
            }
        };

        let args = match args {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(args) => args,
        };

        if let Err(e) = tool.validate(&args) {
            debug!(error = %e, "Argument validation failed");
            return ToolResponse::error(e.client_message());
        }

        let pool = match self.connections.ensure_connection().await {
            Ok(pool) => pool,
            Err(e) => {
                // Detail was logged by the connection manager
                debug!(error = %e, "Connection precondition failed");
                return ToolResponse::error(e.client_message());
            }
        };

        match tool.run(pool.as_ref(), args).await {
            Ok(outcome) => ToolResponse::outcome(&outcome),
            Err(e) => {
                error!(
                    error = %redact_credentials(&e.detail()),
                    "Tool execution failed"
                );
                ToolResponse::error(e.client_message())
            }
        }
    }
}
