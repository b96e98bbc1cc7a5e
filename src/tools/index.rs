//! The `create_index` tool.

use super::inputs::CreateIndexInput;
use super::{database_failure, parse_args, schema_of, Tool, ToolOutcome};
use crate::database::SqlExecutor;
use crate::error::ServerError;
use crate::security::validate_word_identifier;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, instrument};

const CREATE_INDEX_FAILED: &str =
    "Failed to create index. Verify the table and columns exist and the index name is unused. Check server logs for details.";

/// Creates a (unique, clustered) index on a table.
pub struct CreateIndexTool;

impl CreateIndexTool {
    fn parse(args: &Value) -> Result<CreateIndexInput, ServerError> {
        let input: CreateIndexInput = parse_args("create_index", args)?;

        validate_word_identifier(&input.schema_name, "schema name")?;
        validate_word_identifier(&input.table_name, "table name")?;
        validate_word_identifier(&input.index_name, "index name")?;
        if input.columns.is_empty() {
            return Err(ServerError::validation("'columns' must be a non-empty array"));
        }
        for column in &input.columns {
            validate_word_identifier(column, "column name")?;
        }

        Ok(input)
    }

    fn statement(input: &CreateIndexInput) -> String {
        let columns = input
            .columns
            .iter()
            .map(|c| format!("[{}]", c))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "CREATE {}{} INDEX [{}] ON [{}].[{}] ({})",
            if input.is_unique { "UNIQUE " } else { "" },
            if input.is_clustered { "CLUSTERED" } else { "NONCLUSTERED" },
            input.index_name,
            input.schema_name,
            input.table_name,
            columns
        )
    }
}

#[async_trait]
impl Tool for CreateIndexTool {
    fn name(&self) -> &'static str {
        "create_index"
    }

    fn description(&self) -> &'static str {
        "Creates an index on a specified column or columns in an MSSQL Database table"
    }

    fn input_schema(&self) -> Map<String, Value> {
        schema_of::<CreateIndexInput>()
    }

    fn validate(&self, args: &Value) -> Result<(), ServerError> {
        Self::parse(args).map(|_| ())
    }

    #[instrument(skip_all, fields(tool = "create_index"))]
    async fn run(&self, db: &dyn SqlExecutor, args: Value) -> Result<ToolOutcome, ServerError> {
        let input = Self::parse(&args)?;
        let sql = Self::statement(&input);

        match db.execute(&sql, &[]).await {
            Ok(_) => {
                info!(index = %input.index_name, table = %input.table_name, "Index created");
                Ok(ToolOutcome::success(format!(
                    "Index [{}] created successfully on table [{}].[{}]",
                    input.index_name, input.schema_name, input.table_name
                ))
                .with("indexName", &input.index_name)
                .with("isUnique", input.is_unique)
                .with("isClustered", input.is_clustered))
            }
            Err(e) => Ok(database_failure(self.name(), &e, CREATE_INDEX_FAILED)),
        }
    }
}
