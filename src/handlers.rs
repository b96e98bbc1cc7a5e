//! ServerHandler implementation for the MSSQL data MCP server.
//!
//! `tools/list` and `tools/call` are mapped onto the [`Dispatcher`](crate::dispatch::Dispatcher);
//! no other capability is advertised.

use crate::server::MssqlMcpServer;
use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam,
    ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::ErrorData;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

impl ServerHandler for MssqlMcpServer {
    /// Server identification - called during initialization handshake.
    fn get_info(&self) -> ServerInfo {
        info!("MCP client requesting server info");

        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").to_string(),
                title: Some("MSSQL Data MCP Server".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(build_instructions(self)),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        let tools = self
            .dispatcher
            .list_tools()
            .into_iter()
            .map(|def| Tool::new(def.name, def.description, Arc::new(def.input_schema)))
            .collect();

        Ok(ListToolsResult::with_all_items(tools))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let args = request.arguments.map(Value::Object);
        let response = self.dispatcher.dispatch(&request.name, args).await;
        Ok(response.into())
    }
}

/// Build server instructions based on the current mode.
fn build_instructions(server: &MssqlMcpServer) -> String {
    let mut instructions = String::new();

    instructions.push_str("# MSSQL Data MCP Server\n\n");
    instructions.push_str(&format!(
        "Table operations on the SQL Server database `{}`.\n\n",
        server.database
    ));

    if server.dispatcher.is_read_only() {
        instructions.push_str("**Read-only mode**: only `list_table`, `read_data` and `describe_table` are available.\n\n");
    } else {
        instructions.push_str("Tables can be created, described, listed and dropped; rows can be inserted, read and updated.\n\n");
    }

    instructions.push_str("### Best Practices\n");
    instructions.push_str("1. Use `list_table` and `describe_table` before writing queries\n");
    instructions.push_str("2. `read_data` accepts a single SELECT (or WITH) statement\n");
    instructions.push_str("3. `update_data` always requires a WHERE clause\n");

    instructions
}
