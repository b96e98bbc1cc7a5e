//! Table-level tools: create, drop, describe and list.

use super::inputs::{CreateTableInput, DescribeTableInput, DropTableInput, ListTableInput};
use super::{database_failure, parse_args, schema_of, Tool, ToolOutcome};
use crate::constants::MAX_STATEMENT_PARAMETERS;
use crate::database::{SqlExecutor, SqlParam};
use crate::error::ServerError;
use crate::security::{parse_qualified_name, validate_word_identifier};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

const CREATE_TABLE_FAILED: &str =
    "Failed to create table. Verify your SQL syntax. Check server logs for details.";
const DROP_TABLE_FAILED: &str =
    "Failed to drop table. Verify the table exists and has no dependencies. Check server logs for details.";
const DESCRIBE_TABLE_FAILED: &str =
    "Failed to describe table. Verify the table exists and you have permissions. Check server logs for details.";
const LIST_TABLE_FAILED: &str =
    "Failed to list tables. Verify you have permissions. Check server logs for details.";

/// Column type grammar: a type name, an optional size, then column options.
///
/// Options are limited to nullability, keys, `IDENTITY`, `COLLATE` and a
/// literal `DEFAULT`, so a type can never close the column list.
static COLUMN_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)^
        [a-z][a-z0-9_]*
        (\s*\(\s*(max|\d+(\s*,\s*\d+)?)\s*\))?
        (\s+(
            not\s+null
            | null
            | primary\s+key(\s+(clustered|nonclustered))?
            | unique(\s+(clustered|nonclustered))?
            | identity(\s*\(\s*-?\d+\s*,\s*-?\d+\s*\))?
            | collate\s+[a-z0-9_]+
            | default\s+(-?\d+(\.\d+)?|'[^']*'|n'[^']*'|null|getdate\s*\(\s*\)|getutcdate\s*\(\s*\)|sysutcdatetime\s*\(\s*\)|newid\s*\(\s*\))
        ))*
        $",
    )
    .unwrap_or_else(|e| panic!("Internal error: invalid column type pattern: {}", e))
});

/// Creates a table from column definitions.
pub struct CreateTableTool;

impl CreateTableTool {
    fn parse(args: &Value) -> Result<CreateTableInput, ServerError> {
        let input: CreateTableInput = parse_args("create_table", args)?;

        validate_word_identifier(&input.table_name, "table name")?;
        if input.columns.is_empty() {
            return Err(ServerError::validation("'columns' must be a non-empty array"));
        }
        for column in &input.columns {
            validate_word_identifier(&column.name, "column name")?;
            let sql_type = column.sql_type.trim();
            if sql_type.is_empty() {
                return Err(ServerError::validation(format!(
                    "Column '{}' must have a type",
                    column.name
                )));
            }
            if !COLUMN_TYPE.is_match(sql_type) {
                return Err(ServerError::validation(format!(
                    "Invalid type for column '{}': expected a type name, an optional size and column options",
                    column.name
                )));
            }
        }

        Ok(input)
    }
}

#[async_trait]
impl Tool for CreateTableTool {
    fn name(&self) -> &'static str {
        "create_table"
    }

    fn description(&self) -> &'static str {
        "Creates a new table in the MSSQL Database with the specified columns."
    }

    fn input_schema(&self) -> Map<String, Value> {
        schema_of::<CreateTableInput>()
    }

    fn validate(&self, args: &Value) -> Result<(), ServerError> {
        Self::parse(args).map(|_| ())
    }

    #[instrument(skip_all, fields(tool = "create_table"))]
    async fn run(&self, db: &dyn SqlExecutor, args: Value) -> Result<ToolOutcome, ServerError> {
        let input = Self::parse(&args)?;

        let column_defs = input
            .columns
            .iter()
            .map(|col| format!("[{}] {}", col.name, col.sql_type.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("CREATE TABLE [{}] ({})", input.table_name, column_defs);

        match db.execute(&sql, &[]).await {
            Ok(_) => Ok(ToolOutcome::success(format!(
                "Table '{}' created successfully.",
                input.table_name
            ))),
            Err(e) => Ok(database_failure(self.name(), &e, CREATE_TABLE_FAILED)),
        }
    }
}

/// Drops a table.
pub struct DropTableTool;

impl DropTableTool {
    fn parse(args: &Value) -> Result<DropTableInput, ServerError> {
        let input: DropTableInput = parse_args("drop_table", args)?;
        validate_word_identifier(&input.table_name, "table name")?;
        Ok(input)
    }
}

#[async_trait]
impl Tool for DropTableTool {
    fn name(&self) -> &'static str {
        "drop_table"
    }

    fn description(&self) -> &'static str {
        "Drops a table from the MSSQL Database."
    }

    fn input_schema(&self) -> Map<String, Value> {
        schema_of::<DropTableInput>()
    }

    fn validate(&self, args: &Value) -> Result<(), ServerError> {
        Self::parse(args).map(|_| ())
    }

    #[instrument(skip_all, fields(tool = "drop_table"))]
    async fn run(&self, db: &dyn SqlExecutor, args: Value) -> Result<ToolOutcome, ServerError> {
        let input = Self::parse(&args)?;
        let sql = format!("DROP TABLE [{}]", input.table_name);

        match db.execute(&sql, &[]).await {
            Ok(_) => Ok(ToolOutcome::success(format!(
                "Table '{}' dropped successfully.",
                input.table_name
            ))),
            Err(e) => Ok(database_failure(self.name(), &e, DROP_TABLE_FAILED)),
        }
    }
}

/// Lists a table's columns and data types.
pub struct DescribeTableTool;

impl DescribeTableTool {
    fn parse(args: &Value) -> Result<(Option<String>, String), ServerError> {
        let input: DescribeTableInput = parse_args("describe_table", args).map_err(|_| {
            ServerError::validation("Missing or invalid 'tableName' argument for describe_table tool.")
        })?;
        if input.table_name.trim().is_empty() {
            return Err(ServerError::validation(
                "Missing or invalid 'tableName' argument for describe_table tool.",
            ));
        }
        parse_qualified_name(&input.table_name)
    }
}

#[async_trait]
impl Tool for DescribeTableTool {
    fn name(&self) -> &'static str {
        "describe_table"
    }

    fn description(&self) -> &'static str {
        "Describes the schema (columns and types) of a specified MSSQL Database table."
    }

    fn input_schema(&self) -> Map<String, Value> {
        schema_of::<DescribeTableInput>()
    }

    fn validate(&self, args: &Value) -> Result<(), ServerError> {
        Self::parse(args).map(|_| ())
    }

    #[instrument(skip_all, fields(tool = "describe_table"))]
    async fn run(&self, db: &dyn SqlExecutor, args: Value) -> Result<ToolOutcome, ServerError> {
        let (schema, table) = Self::parse(&args)?;

        let mut sql = String::from(
            "SELECT COLUMN_NAME AS name, DATA_TYPE AS type \
             FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = @P1",
        );
        let mut params = vec![SqlParam::Text(table.clone())];
        if let Some(schema) = schema {
            sql.push_str(" AND TABLE_SCHEMA = @P2");
            params.push(SqlParam::Text(schema));
        }
        sql.push_str(" ORDER BY ORDINAL_POSITION");

        match db.query(&sql, &params, usize::MAX).await {
            Ok(result) if result.rows.is_empty() => {
                debug!(table = %table, "No columns found");
                Ok(ToolOutcome::failure(DESCRIBE_TABLE_FAILED))
            }
            Ok(result) => Ok(ToolOutcome::ok().with("columns", result.rows)),
            Err(e) => Ok(database_failure(self.name(), &e, DESCRIBE_TABLE_FAILED)),
        }
    }
}

/// Lists base tables, optionally restricted to some schemas.
pub struct ListTableTool;

impl ListTableTool {
    fn parse(args: &Value) -> Result<Vec<String>, ServerError> {
        let input: ListTableInput = parse_args("list_table", args)?;
        let schemas: Vec<String> = input
            .parameters
            .unwrap_or_default()
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if schemas.len() > MAX_STATEMENT_PARAMETERS {
            return Err(ServerError::validation(format!(
                "Too many schema filters: at most {} are allowed",
                MAX_STATEMENT_PARAMETERS
            )));
        }
        Ok(schemas)
    }
}

#[async_trait]
impl Tool for ListTableTool {
    fn name(&self) -> &'static str {
        "list_table"
    }

    fn description(&self) -> &'static str {
        "Lists tables in an MSSQL Database, or list tables in specific schemas"
    }

    fn input_schema(&self) -> Map<String, Value> {
        schema_of::<ListTableInput>()
    }

    fn validate(&self, args: &Value) -> Result<(), ServerError> {
        Self::parse(args).map(|_| ())
    }

    #[instrument(skip_all, fields(tool = "list_table"))]
    async fn run(&self, db: &dyn SqlExecutor, args: Value) -> Result<ToolOutcome, ServerError> {
        let schemas = Self::parse(&args)?;

        let mut sql = String::from(
            "SELECT TABLE_SCHEMA + '.' + TABLE_NAME AS name \
             FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_TYPE = 'BASE TABLE'",
        );
        if !schemas.is_empty() {
            let placeholders = (1..=schemas.len())
                .map(|i| format!("@P{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" AND TABLE_SCHEMA IN ({})", placeholders));
        }
        sql.push_str(" ORDER BY TABLE_SCHEMA, TABLE_NAME");

        let params: Vec<SqlParam> = schemas.into_iter().map(SqlParam::Text).collect();
        match db.query(&sql, &params, usize::MAX).await {
            Ok(result) => Ok(ToolOutcome::success("List tables executed successfully")
                .with("items", result.rows)),
            Err(e) => Ok(database_failure(self.name(), &e, LIST_TABLE_FAILED)),
        }
    }
}
