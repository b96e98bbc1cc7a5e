//! Configuration management for the MSSQL data MCP server.
//!
//! Configuration is loaded from environment variables following the 12-factor app pattern.
//! Loading goes through [`SettingsSource`] so the credential resolver can re-read the
//! settings on every reconnect and tests can supply a plain map.

use crate::constants::{
    APPLICATION_NAME, DEFAULT_CONNECTION_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT,
    DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_RESULT_ROWS, DEFAULT_PORT, DEFAULT_QUERY_TIMEOUT_SECS,
};
use crate::error::ServerError;
use secrecy::SecretString;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// A key/value source of settings.
pub trait SettingsSource: Send + Sync {
    /// Look up a setting. Returns `None` when the key is not set.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads settings from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl SettingsSource for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug)]
pub struct Config {
    /// Database connection configuration
    pub database: DatabaseConfig,

    /// Advertise and accept only the read-only tools
    pub read_only: bool,

    /// Per-statement timeout
    pub query_timeout: Duration,

    /// Maximum rows returned by `read_data`
    pub max_result_rows: usize,
}

/// Database connection configuration.
#[derive(Debug)]
pub struct DatabaseConfig {
    /// SQL Server hostname or IP address
    pub host: String,

    /// SQL Server port (default: 1433)
    pub port: u16,

    /// Database name
    pub database: String,

    /// SQL authentication credentials; `None` selects Azure AD token auth
    pub credentials: Option<StaticCredentials>,

    /// Enable TLS encryption
    pub encrypt: bool,

    /// Trust server certificate (for self-signed certs)
    pub trust_server_certificate: bool,

    /// Connection timeout
    pub connection_timeout: Duration,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Idle connection timeout
    pub idle_timeout: Duration,

    /// Application name sent to SQL Server
    pub application_name: String,
}

/// SQL Server username/password pair.
#[derive(Debug)]
pub struct StaticCredentials {
    pub username: String,
    pub password: SecretString,
}

/// How the server authenticates to SQL Server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// SQL Server authentication with a fixed username/password.
    Static,
    /// Azure AD access token, refreshed before expiry.
    Token,
}

impl AuthMode {
    /// Derive the auth mode from the presence of `SQL_USERNAME`.
    ///
    /// This only looks at the username; whether the pair is complete is checked
    /// when the configuration is loaded.
    pub fn detect(source: &dyn SettingsSource) -> Self {
        if non_empty(source, "SQL_USERNAME").is_some() {
            AuthMode::Static
        } else {
            AuthMode::Token
        }
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMode::Static => write!(f, "sql"),
            AuthMode::Token => write!(f, "azure-ad"),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_source(&ProcessEnv)
    }

    /// Load configuration from a settings source.
    ///
    /// # Settings
    ///
    /// ## Required
    /// - `SERVER_NAME`: SQL Server host, optionally `host,port` and an optional `tcp:` prefix
    /// - `DATABASE_NAME`: Database name
    ///
    /// ## Optional
    /// - `SQL_USERNAME` / `SQL_PASSWORD`: SQL authentication (both or neither);
    ///   Azure AD token authentication is used when both are unset
    /// - `TRUST_SERVER_CERTIFICATE`: Trust server certificate (default: false)
    /// - `ENCRYPT`: Enable TLS (default: true)
    /// - `CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 30, minimum: 1)
    /// - `QUERY_TIMEOUT`: Statement timeout in seconds (default: 30, minimum: 1)
    /// - `MAX_RESULT_ROWS`: Rows returned by read_data (default: 10000)
    /// - `POOL_MAX_CONNECTIONS`: Maximum pool connections (default: 10)
    /// - `READONLY`: Only expose read tools (default: false)
    pub fn from_source(source: &dyn SettingsSource) -> Result<Self, ServerError> {
        let (server, database) = match (
            non_empty(source, "SERVER_NAME"),
            non_empty(source, "DATABASE_NAME"),
        ) {
            (Some(server), Some(database)) => (server, database),
            _ => {
                return Err(ServerError::config(
                    "SERVER_NAME and DATABASE_NAME environment variables are required",
                ))
            }
        };

        let (host, port) = parse_server_name(&server)?;
        let credentials = load_credentials(source)?;

        let encrypt = parse_bool(source, "ENCRYPT", true);
        let trust_server_certificate = parse_bool(source, "TRUST_SERVER_CERTIFICATE", false);
        let read_only = parse_bool(source, "READONLY", false);

        // The pool builder rejects a zero connection timeout
        let connection_timeout_secs =
            parse_number(source, "CONNECTION_TIMEOUT", DEFAULT_CONNECTION_TIMEOUT_SECS).max(1);
        let query_timeout_secs =
            parse_number(source, "QUERY_TIMEOUT", DEFAULT_QUERY_TIMEOUT_SECS).max(1);
        let max_result_rows = parse_number(source, "MAX_RESULT_ROWS", DEFAULT_MAX_RESULT_ROWS);
        let max_connections =
            parse_number(source, "POOL_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS).max(1);

        Ok(Config {
            database: DatabaseConfig {
                host,
                port,
                database,
                credentials,
                encrypt,
                trust_server_certificate,
                connection_timeout: Duration::from_secs(connection_timeout_secs),
                max_connections,
                idle_timeout: DEFAULT_IDLE_TIMEOUT,
                application_name: APPLICATION_NAME.to_string(),
            },
            read_only,
            query_timeout: Duration::from_secs(query_timeout_secs),
            max_result_rows,
        })
    }

    /// Authentication mode selected by this configuration.
    pub fn auth_mode(&self) -> AuthMode {
        if self.database.credentials.is_some() {
            AuthMode::Static
        } else {
            AuthMode::Token
        }
    }
}

/// Read the SQL credential pair.
///
/// An empty value counts as unset, so `SQL_USERNAME=""` with a password is an
/// asymmetric pair.
fn load_credentials(source: &dyn SettingsSource) -> Result<Option<StaticCredentials>, ServerError> {
    let username = non_empty(source, "SQL_USERNAME");
    let password = non_empty(source, "SQL_PASSWORD");

    match (username, password) {
        (Some(username), Some(password)) => {
            if username.trim().is_empty() || password.trim().is_empty() {
                return Err(ServerError::config(
                    "SQL_USERNAME and SQL_PASSWORD must be non-empty strings",
                ));
            }
            Ok(Some(StaticCredentials {
                username,
                password: SecretString::from(password),
            }))
        }
        (None, None) => Ok(None),
        _ => Err(ServerError::config(
            "Both SQL_USERNAME and SQL_PASSWORD must be provided together for SQL Authentication",
        )),
    }
}

/// Split `SERVER_NAME` into host and port.
///
/// Accepts `host`, `host,port` and the `tcp:` prefix used in Azure connection strings.
fn parse_server_name(server: &str) -> Result<(String, u16), ServerError> {
    let trimmed = server.trim();
    let without_prefix = trimmed
        .strip_prefix("tcp:")
        .or_else(|| trimmed.strip_prefix("TCP:"))
        .unwrap_or(trimmed);

    match without_prefix.split_once(',') {
        Some((host, port)) => {
            let port = port.trim().parse::<u16>().map_err(|_| {
                ServerError::config(format!("Invalid port in SERVER_NAME: '{}'", port.trim()))
            })?;
            Ok((host.trim().to_string(), port))
        }
        None => Ok((without_prefix.to_string(), DEFAULT_PORT)),
    }
}

fn non_empty(source: &dyn SettingsSource, key: &str) -> Option<String> {
    source.get(key).filter(|v| !v.is_empty())
}

fn parse_bool(source: &dyn SettingsSource, key: &str, default: bool) -> bool {
    source
        .get(key)
        .map(|v| v.trim().eq_ignore_ascii_case("true") || v.trim() == "1")
        .unwrap_or(default)
}

fn parse_number<T: FromStr + std::fmt::Display + Copy>(
    source: &dyn SettingsSource,
    key: &str,
    default: T,
) -> T {
    match source.get(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {} value '{}', using {}", key, raw, default);
            default
        }),
        None => default,
    }
}
