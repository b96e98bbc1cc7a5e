//! Row-level tools: insert, read and update.

use super::inputs::{InsertDataInput, ReadDataInput, UpdateDataInput};
use super::{database_failure, parse_args, schema_of, Tool, ToolOutcome};
use crate::constants::{MAX_INSERT_ROWS, MAX_READ_QUERY_LENGTH, MAX_STATEMENT_PARAMETERS};
use crate::database::{SqlExecutor, SqlParam};
use crate::error::ServerError;
use crate::security::{
    escape_identifier, escape_single_identifier, InjectionDetector, ReadQueryValidator,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{info, instrument};

const INSERT_DATA_FAILED: &str =
    "Failed to insert data. Verify the table exists and the data types are correct. Check server logs for details.";
const READ_DATA_FAILED: &str =
    "Failed to execute query. Verify your SQL syntax and table names. Check server logs for details.";
const UPDATE_DATA_FAILED: &str =
    "Failed to update data. Verify the table, columns and WHERE clause. Check server logs for details.";

/// A validated, ready-to-run statement.
struct Statement {
    sql: String,
    params: Vec<SqlParam>,
}

/// Inserts one or more records that share the same columns.
pub struct InsertDataTool;

impl InsertDataTool {
    fn parse(args: &Value) -> Result<(String, usize, Statement), ServerError> {
        let input: InsertDataInput = parse_args("insert_data", args)?;
        let table = escape_identifier(&input.table_name)?;
        let records = input.data.into_vec();

        let first = records
            .first()
            .ok_or_else(|| ServerError::validation("'data' must contain at least one record"))?;
        if first.is_empty() {
            return Err(ServerError::validation("Records must have at least one column"));
        }
        if records.len() > MAX_INSERT_ROWS {
            return Err(ServerError::validation(format!(
                "Too many records: at most {} can be inserted at once",
                MAX_INSERT_ROWS
            )));
        }

        let columns: Vec<&String> = first.keys().collect();
        for (idx, record) in records.iter().enumerate().skip(1) {
            let same_columns =
                record.len() == columns.len() && columns.iter().all(|c| record.contains_key(*c));
            if !same_columns {
                return Err(ServerError::validation(format!(
                    "All records must have the same columns. Record {} differs from the first record.",
                    idx + 1
                )));
            }
        }

        let param_count = records.len() * columns.len();
        if param_count > MAX_STATEMENT_PARAMETERS {
            return Err(ServerError::validation(format!(
                "Too many values: {} exceeds the limit of {} parameters per statement",
                param_count, MAX_STATEMENT_PARAMETERS
            )));
        }

        let column_list = columns
            .iter()
            .map(|c| escape_single_identifier(c))
            .collect::<Result<Vec<_>, _>>()?
            .join(", ");

        let mut params = Vec::with_capacity(param_count);
        let mut rows = Vec::with_capacity(records.len());
        for record in &records {
            let placeholders = columns
                .iter()
                .map(|column| {
                    params.push(SqlParam::from_json(
                        record.get(column.as_str()).unwrap_or(&Value::Null),
                    ));
                    format!("@P{}", params.len())
                })
                .collect::<Vec<_>>()
                .join(", ");
            rows.push(format!("({})", placeholders));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            table,
            column_list,
            rows.join(", ")
        );
        Ok((input.table_name, records.len(), Statement { sql, params }))
    }
}

#[async_trait]
impl Tool for InsertDataTool {
    fn name(&self) -> &'static str {
        "insert_data"
    }

    fn description(&self) -> &'static str {
        "Inserts data into an MSSQL Database table. Supports both single record insertion and \
         multiple record insertion using standard SQL INSERT with VALUES clause. All records must \
         have the same columns."
    }

    fn input_schema(&self) -> Map<String, Value> {
        schema_of::<InsertDataInput>()
    }

    fn validate(&self, args: &Value) -> Result<(), ServerError> {
        Self::parse(args).map(|_| ())
    }

    #[instrument(skip_all, fields(tool = "insert_data"))]
    async fn run(&self, db: &dyn SqlExecutor, args: Value) -> Result<ToolOutcome, ServerError> {
        let (table, count, statement) = Self::parse(&args)?;

        match db.execute(&statement.sql, &statement.params).await {
            Ok(_) => {
                info!(table = %table, records = count, "Records inserted");
                Ok(ToolOutcome::success(format!(
                    "Successfully inserted {} record{} into {}",
                    count,
                    if count == 1 { "" } else { "s" },
                    table
                ))
                .with("recordsInserted", count))
            }
            Err(e) => Ok(database_failure(self.name(), &e, INSERT_DATA_FAILED)),
        }
    }
}

/// Runs a validated SELECT query.
pub struct ReadDataTool {
    max_rows: usize,
    validator: ReadQueryValidator,
}

impl ReadDataTool {
    pub fn new(max_rows: usize) -> Self {
        Self {
            max_rows,
            validator: ReadQueryValidator::new(MAX_READ_QUERY_LENGTH),
        }
    }

    fn parse(&self, args: &Value) -> Result<String, ServerError> {
        let input: ReadDataInput = parse_args("read_data", args)?;
        self.validator.validate(&input.query)?;
        Ok(input.query)
    }
}

#[async_trait]
impl Tool for ReadDataTool {
    fn name(&self) -> &'static str {
        "read_data"
    }

    fn description(&self) -> &'static str {
        "Executes a SELECT query on an MSSQL Database table. The query must start with SELECT \
         (or WITH) and cannot contain any destructive SQL operations for security reasons."
    }

    fn input_schema(&self) -> Map<String, Value> {
        schema_of::<ReadDataInput>()
    }

    fn validate(&self, args: &Value) -> Result<(), ServerError> {
        self.parse(args).map(|_| ())
    }

    #[instrument(skip_all, fields(tool = "read_data"))]
    async fn run(&self, db: &dyn SqlExecutor, args: Value) -> Result<ToolOutcome, ServerError> {
        let query = self.parse(&args)?;

        match db.query(&query, &[], self.max_rows).await {
            Ok(result) => {
                let count = result.rows.len();
                let mut message = format!("Query executed successfully. Retrieved {} record(s)", count);
                if result.truncated {
                    message.push_str(&format!(" (limited to {} rows)", self.max_rows));
                }
                Ok(ToolOutcome::success(message)
                    .with("data", result.rows)
                    .with("recordCount", count)
                    .with("truncated", result.truncated))
            }
            Err(e) => Ok(database_failure(self.name(), &e, READ_DATA_FAILED)),
        }
    }
}

/// Updates records matching a required WHERE clause.
pub struct UpdateDataTool;

impl UpdateDataTool {
    fn parse(args: &Value) -> Result<(String, Statement), ServerError> {
        let input: UpdateDataInput = parse_args("update_data", args)?;
        let table = escape_identifier(&input.table_name)?;

        if input.updates.is_empty() {
            return Err(ServerError::validation(
                "'updates' must contain at least one column",
            ));
        }
        if input.updates.len() > MAX_STATEMENT_PARAMETERS {
            return Err(ServerError::validation(format!(
                "Too many columns: at most {} can be updated at once",
                MAX_STATEMENT_PARAMETERS
            )));
        }

        let where_clause = input.where_clause.trim();
        if where_clause.is_empty() {
            return Err(ServerError::validation(
                "WHERE clause is required for security reasons",
            ));
        }
        if where_clause.contains(';') {
            return Err(ServerError::validation(
                "WHERE clause must not contain statement separators",
            ));
        }
        InjectionDetector::new().check(where_clause)?;

        let mut params = Vec::with_capacity(input.updates.len());
        let assignments = input
            .updates
            .iter()
            .map(|(column, value)| -> Result<String, ServerError> {
                params.push(SqlParam::from_json(value));
                Ok(format!("{} = @P{}", escape_single_identifier(column)?, params.len()))
            })
            .collect::<Result<Vec<_>, ServerError>>()?
            .join(", ");

        let sql = format!("UPDATE {} SET {} WHERE {}", table, assignments, where_clause);
        Ok((input.table_name, Statement { sql, params }))
    }
}

#[async_trait]
impl Tool for UpdateDataTool {
    fn name(&self) -> &'static str {
        "update_data"
    }

    fn description(&self) -> &'static str {
        "Updates data in an MSSQL Database table using a WHERE clause. The WHERE clause must be \
         provided for security."
    }

    fn input_schema(&self) -> Map<String, Value> {
        schema_of::<UpdateDataInput>()
    }

    fn validate(&self, args: &Value) -> Result<(), ServerError> {
        Self::parse(args).map(|_| ())
    }

    #[instrument(skip_all, fields(tool = "update_data"))]
    async fn run(&self, db: &dyn SqlExecutor, args: Value) -> Result<ToolOutcome, ServerError> {
        let (table, statement) = Self::parse(&args)?;

        match db.execute(&statement.sql, &statement.params).await {
            Ok(rows_affected) => {
                info!(table = %table, rows_affected, "Records updated");
                Ok(ToolOutcome::success(format!(
                    "Update completed successfully. {} row(s) affected",
                    rows_affected
                ))
                .with("rowsAffected", rows_affected))
            }
            Err(e) => Ok(database_failure(self.name(), &e, UPDATE_DATA_FAILED)),
        }
    }
}
