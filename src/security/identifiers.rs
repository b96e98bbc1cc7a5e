//! SQL Server identifier validation and escaping.
//!
//! Identifiers cannot be bound as query parameters, so they are either restricted
//! to word characters or escaped with bracket notation `[identifier]`.

use crate::error::ServerError;

/// Maximum length for SQL Server identifiers.
pub const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Require an identifier made only of ASCII letters, digits and underscores.
///
/// Used by the DDL tools, where the name is spliced into the statement.
/// `what` names the identifier in the error message ("table name", "column name").
pub fn validate_word_identifier(identifier: &str, what: &str) -> Result<(), ServerError> {
    if identifier.is_empty() {
        return Err(ServerError::validation(format!("Invalid {}: cannot be empty.", what)));
    }

    if identifier.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ServerError::validation(format!(
            "Invalid {}: exceeds maximum length of {} characters.",
            what, MAX_IDENTIFIER_LENGTH
        )));
    }

    if !identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ServerError::validation(format!(
            "Invalid {}: only letters, digits and underscores are allowed.",
            what
        )));
    }

    Ok(())
}

/// Escape a SQL Server identifier using bracket notation.
///
/// This function handles:
/// - Schema-qualified names (`dbo.Users` -> `[dbo].[Users]`)
/// - Simple names (`Users` -> `[Users]`)
/// - Names that contain brackets (escaped as `]]`)
///
/// # Examples
///
/// ```
/// use mssql_data_mcp::security::escape_identifier;
///
/// assert_eq!(escape_identifier("Users").unwrap(), "[Users]");
/// assert_eq!(escape_identifier("dbo.Users").unwrap(), "[dbo].[Users]");
/// assert_eq!(escape_identifier("My Table").unwrap(), "[My Table]");
/// ```
pub fn escape_identifier(identifier: &str) -> Result<String, ServerError> {
    match parse_qualified_name(identifier)? {
        (Some(schema), name) => Ok(format!(
            "{}.{}",
            escape_single_identifier(&schema)?,
            escape_single_identifier(&name)?
        )),
        (None, name) => escape_single_identifier(&name),
    }
}

/// Escape a single identifier (no dots), such as a column name.
pub fn escape_single_identifier(identifier: &str) -> Result<String, ServerError> {
    let trimmed = identifier.trim();

    if trimmed.is_empty() {
        return Err(ServerError::validation("Identifier cannot be empty"));
    }

    if trimmed.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ServerError::validation(format!(
            "Identifier exceeds maximum length of {} characters",
            MAX_IDENTIFIER_LENGTH
        )));
    }

    if trimmed.contains('\0') {
        return Err(ServerError::validation("Identifier contains a null byte"));
    }

    // Only strip brackets when both outer brackets exist
    let clean = if trimmed.len() >= 2 && trimmed.starts_with('[') && trimmed.ends_with(']') {
        &trimmed[1..trimmed.len() - 1]
    } else {
        trimmed
    };

    Ok(format!("[{}]", clean.replace(']', "]]")))
}

/// Parse a potentially schema-qualified identifier.
///
/// Returns (schema, name) tuple. Schema is None if not specified.
pub fn parse_qualified_name(identifier: &str) -> Result<(Option<String>, String), ServerError> {
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return Err(ServerError::validation("Identifier cannot be empty"));
    }

    if let Some((schema, name)) = identifier.split_once('.') {
        if !schema.is_empty() && !name.is_empty() {
            return Ok((Some(schema.to_string()), name.to_string()));
        }
    }

    Ok((None, identifier.to_string()))
}
