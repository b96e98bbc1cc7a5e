//! Tool input types with JSON Schema generation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One column of a `create_table` request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ColumnDefinition {
    /// Column name.
    #[schemars(description = "Column name")]
    pub name: String,

    /// SQL type and constraints.
    #[serde(rename = "type")]
    #[schemars(description = "SQL type and constraints (e.g., 'INT PRIMARY KEY', 'NVARCHAR(255) NOT NULL')")]
    pub sql_type: String,
}

/// Input for the `create_table` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTableInput {
    #[schemars(description = "Name of the table to create")]
    pub table_name: String,

    #[schemars(
        description = "Array of column definitions (e.g., [{ name: 'id', type: 'INT PRIMARY KEY' }, ...])"
    )]
    pub columns: Vec<ColumnDefinition>,
}

/// Input for the `drop_table` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DropTableInput {
    #[schemars(description = "Name of the table to drop")]
    pub table_name: String,
}

/// Input for the `describe_table` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescribeTableInput {
    #[schemars(description = "Name of the table to describe, optionally schema-qualified (e.g., 'dbo.Users')")]
    pub table_name: String,
}

/// Input for the `list_table` tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListTableInput {
    /// Schema names to filter by.
    #[serde(default)]
    #[schemars(description = "Schemas to filter by (optional)")]
    pub parameters: Option<Vec<String>>,
}

/// Records for `insert_data`: a single object or an array of objects.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum InsertRecords {
    Many(Vec<Map<String, Value>>),
    One(Map<String, Value>),
}

impl InsertRecords {
    /// Normalize to a list of records.
    pub fn into_vec(self) -> Vec<Map<String, Value>> {
        match self {
            InsertRecords::Many(records) => records,
            InsertRecords::One(record) => vec![record],
        }
    }
}

/// Input for the `insert_data` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InsertDataInput {
    #[schemars(description = "Name of the table to insert data into")]
    pub table_name: String,

    #[schemars(
        description = "Data to insert: a single object (e.g., {\"name\": \"John\", \"age\": 30}) or an array of objects that all share the same columns"
    )]
    pub data: InsertRecords,
}

/// Input for the `read_data` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadDataInput {
    #[schemars(description = "SQL SELECT query to execute (must start with SELECT or WITH)")]
    pub query: String,
}

/// Input for the `update_data` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDataInput {
    #[schemars(description = "Name of the table to update")]
    pub table_name: String,

    #[schemars(description = "Key-value pairs of columns to update (e.g., {\"status\": \"active\"})")]
    pub updates: Map<String, Value>,

    #[schemars(
        description = "WHERE clause to identify which records to update (e.g., \"id = 5\"). Required."
    )]
    pub where_clause: String,
}

/// Input for the `create_index` tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateIndexInput {
    #[serde(default = "default_schema")]
    #[schemars(description = "Schema of the table (default: dbo)")]
    pub schema_name: String,

    #[schemars(description = "Name of the table to create the index on")]
    pub table_name: String,

    #[schemars(description = "Name for the new index")]
    pub index_name: String,

    #[schemars(description = "Columns to include in the index, in order")]
    pub columns: Vec<String>,

    #[serde(default)]
    #[schemars(description = "Create a UNIQUE index (default: false)")]
    pub is_unique: bool,

    #[serde(default)]
    #[schemars(description = "Create a CLUSTERED index (default: false)")]
    pub is_clustered: bool,
}

fn default_schema() -> String {
    "dbo".to_string()
}
