//! MCP tools for SQL Server table operations.
//!
//! - `insert_data`: Insert one or more records into a table
//! - `read_data`: Run a validated SELECT query
//! - `describe_table`: List a table's columns and types
//! - `update_data`: Update records matching a WHERE clause
//! - `create_table`: Create a table from column definitions
//! - `create_index`: Create an index on a table
//! - `drop_table`: Drop a table
//! - `list_table`: List base tables, optionally filtered by schema
//!
//! Each tool validates its arguments before the dispatcher touches the
//! database, then builds one parameterized statement and runs it on the
//! shared pool.

mod data;
mod index;
mod inputs;
mod table;

pub use data::{InsertDataTool, ReadDataTool, UpdateDataTool};
pub use index::CreateIndexTool;
pub use inputs::*;
pub use table::{CreateTableTool, DescribeTableTool, DropTableTool, ListTableTool};

use crate::database::SqlExecutor;
use crate::error::ServerError;
use crate::security::redact_credentials;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::error;

/// Tools advertised in read-only mode, in listing order.
pub const READ_ONLY_TOOLS: [&str; 3] = ["list_table", "read_data", "describe_table"];

/// A named, schema-described operation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique, stable tool name.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the arguments object.
    fn input_schema(&self) -> Map<String, Value>;

    /// Check the arguments without touching the database.
    fn validate(&self, args: &Value) -> Result<(), ServerError>;

    /// Run the tool on a connected pool.
    ///
    /// Database failures are logged and reported as an unsuccessful
    /// [`ToolOutcome`]; `Err` is reserved for arguments that fail validation.
    async fn run(&self, db: &dyn SqlExecutor, args: Value) -> Result<ToolOutcome, ServerError>;
}

/// The JSON object a tool returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Tool-specific fields, flattened next to `success` and `message`.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolOutcome {
    /// A successful outcome with a message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    /// A successful outcome without a message.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            extra: Map::new(),
        }
    }

    /// An unsuccessful outcome with a client-safe message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            extra: Map::new(),
        }
    }

    /// Attach a tool-specific field.
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.extra.insert(key.to_string(), value);
        self
    }
}

/// Log a database failure with credentials redacted and build the client-facing outcome.
pub(crate) fn database_failure(tool: &str, err: &ServerError, message: &str) -> ToolOutcome {
    error!(
        tool = tool,
        error = %redact_credentials(&err.detail()),
        "Tool execution failed"
    );
    ToolOutcome::failure(message)
}

/// Deserialize tool arguments, naming the tool in the error.
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ServerError> {
    T::deserialize(args)
        .map_err(|e| ServerError::validation(format!("Invalid arguments for {}: {}", tool, e)))
}

/// JSON Schema of an input type as a plain object.
pub(crate) fn schema_of<T: JsonSchema>() -> Map<String, Value> {
    match serde_json::to_value(schemars::schema_for!(T)) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Fixed mapping from tool name to tool, in listing order.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Registry of all eight tools.
    pub fn standard(max_result_rows: usize) -> Self {
        Self::from_tools(vec![
            Arc::new(InsertDataTool),
            Arc::new(ReadDataTool::new(max_result_rows)),
            Arc::new(DescribeTableTool),
            Arc::new(UpdateDataTool),
            Arc::new(CreateTableTool),
            Arc::new(CreateIndexTool),
            Arc::new(DropTableTool),
            Arc::new(ListTableTool),
        ])
    }

    /// Registry of the given tools. Later duplicates of a name are ignored.
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut unique: Vec<Arc<dyn Tool>> = Vec::with_capacity(tools.len());
        for tool in tools {
            if !unique.iter().any(|t| t.name() == tool.name()) {
                unique.push(tool);
            }
        }
        Self { tools: unique }
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    /// Tools visible in the given mode.
    pub fn visible(&self, read_only: bool) -> Vec<&Arc<dyn Tool>> {
        if read_only {
            READ_ONLY_TOOLS
                .iter()
                .filter_map(|name| self.get(name))
                .collect()
        } else {
            self.tools.iter().collect()
        }
    }

    /// Whether `name` is callable in the given mode.
    pub fn is_visible(&self, name: &str, read_only: bool) -> bool {
        self.get(name).is_some() && (!read_only || READ_ONLY_TOOLS.contains(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(tools: Vec<&Arc<dyn Tool>>) -> Vec<&'static str> {
        tools.iter().map(|t| t.name()).collect()
    }

    #[test]
    fn test_full_registry_order() {
        let registry = ToolRegistry::standard(100);
        assert_eq!(
            names(registry.visible(false)),
            vec![
                "insert_data",
                "read_data",
                "describe_table",
                "update_data",
                "create_table",
                "create_index",
                "drop_table",
                "list_table",
            ]
        );
    }

    #[test]
    fn test_read_only_subset() {
        let registry = ToolRegistry::standard(100);
        assert_eq!(
            names(registry.visible(true)),
            vec!["list_table", "read_data", "describe_table"]
        );
        assert!(registry.is_visible("read_data", true));
        assert!(!registry.is_visible("drop_table", true));
        assert!(registry.is_visible("drop_table", false));
        assert!(!registry.is_visible("nope", false));
    }

    #[test]
    fn test_duplicate_names_are_ignored() {
        let registry = ToolRegistry::from_tools(vec![
            Arc::new(DropTableTool),
            Arc::new(DropTableTool),
        ]);
        assert_eq!(registry.visible(false).len(), 1);
    }

    #[test]
    fn test_outcome_serialization_flattens_extra() {
        let outcome = ToolOutcome::success("done").with("rowsAffected", 3);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": true, "message": "done", "rowsAffected": 3})
        );

        let outcome = ToolOutcome::ok().with("columns", Vec::<String>::new());
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({"success": true, "columns": []})
        );
    }

    #[test]
    fn test_schemas_are_objects() {
        for tool in ToolRegistry::standard(100).visible(false) {
            let schema = tool.input_schema();
            assert_eq!(schema.get("type"), Some(&json!("object")), "{}", tool.name());
        }
    }
}
