//! Centralized constants for the MSSQL data MCP server.
//!
//! This module contains all magic numbers and default values used throughout
//! the codebase, making them easy to find, understand, and modify.

use std::time::Duration;

// =============================================================================
// Timeout Constants
// =============================================================================

/// Default connection timeout in seconds.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Time allowed for closing the pool during shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Connection Pool Constants
// =============================================================================

/// Default SQL Server port.
pub const DEFAULT_PORT: u16 = 1433;

/// Default maximum connections in pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Idle connections older than this are reaped by the pool.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Application name reported to SQL Server.
pub const APPLICATION_NAME: &str = "mssql-data-mcp";

// =============================================================================
// Azure AD Token Constants
// =============================================================================

/// Scope requested for Azure SQL Database access tokens.
pub const AZURE_SQL_SCOPE: &str = "https://database.windows.net/.default";

/// A cached token is refreshed once it is within this many seconds of expiry.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 2 * 60;

/// Assumed token lifetime, in seconds, when the identity provider reports no expiry.
pub const TOKEN_FALLBACK_LIFETIME_SECS: i64 = 30 * 60;

// =============================================================================
// Result and Input Size Constants
// =============================================================================

/// Default maximum rows returned by `read_data`.
pub const DEFAULT_MAX_RESULT_ROWS: usize = 10_000;

/// Maximum length of a `read_data` query, in characters.
pub const MAX_READ_QUERY_LENGTH: usize = 10_000;

/// Bound values per statement.
///
/// SQL Server allows 2100 parameters per request, and `sp_executesql` takes two
/// of them for the statement text and parameter declarations.
pub const MAX_STATEMENT_PARAMETERS: usize = 2_098;

/// SQL Server accepts at most 1000 row value expressions per INSERT.
pub const MAX_INSERT_ROWS: usize = 1_000;

// =============================================================================
// Client-facing Messages
// =============================================================================

/// Generic message returned when a tool fails for a non-validation reason.
pub const GENERIC_OPERATION_ERROR: &str =
    "An error occurred while executing the database operation. Check server logs for details.";

/// Logged when SQL authentication cannot establish a connection; callers see
/// [`GENERIC_OPERATION_ERROR`].
pub const STATIC_CONNECTION_FAILED: &str =
    "Database connection failed. Verify SQL_USERNAME, SQL_PASSWORD, and server connectivity.";

/// Logged when Azure AD authentication cannot establish a connection; callers
/// see [`GENERIC_OPERATION_ERROR`].
pub const TOKEN_CONNECTION_FAILED: &str =
    "Database connection failed. Verify Azure AD authentication and server connectivity.";

