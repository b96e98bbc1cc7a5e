//! Error types for the MSSQL data MCP server.
//!
//! Internal detail (driver messages, connection settings, credentials) stays in
//! these values and is only ever logged. What a caller sees comes from
//! [`ServerError::client_message`].

use crate::constants::GENERIC_OPERATION_ERROR;
use thiserror::Error;

/// Domain-specific errors for the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing or malformed settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity or token acquisition failure.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Pool establishment or health failure.
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Malformed tool arguments. The message is safe to show to callers.
    #[error("{0}")]
    Validation(String),

    /// Driver or query failure while running a tool.
    #[error("Query execution error: {message}")]
    Operation {
        message: String,
        sql_error_code: Option<u32>,
    },

    /// Statement exceeded the configured query timeout.
    #[error("Query timeout: operation exceeded {timeout_seconds} seconds")]
    Timeout { timeout_seconds: u64 },
}

impl ServerError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authentication error.
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a connection error with a source.
    pub fn connection_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an operation error.
    pub fn operation(msg: impl Into<String>) -> Self {
        Self::Operation {
            message: msg.into(),
            sql_error_code: None,
        }
    }

    /// Create a timeout error.
    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout {
            timeout_seconds: seconds,
        }
    }

    /// Check if this is an argument validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Full diagnostic text, including the source chain, for operator logs.
    pub fn detail(&self) -> String {
        let mut text = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            text.push_str(": ");
            text.push_str(&cause.to_string());
            source = cause.source();
        }
        text
    }

    /// Text that may be returned to a caller.
    ///
    /// Validation messages are specific since they reveal no secrets; every
    /// other error collapses to one generic message.
    pub fn client_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            _ => GENERIC_OPERATION_ERROR.to_string(),
        }
    }
}

/// Map SQL Server error numbers to semantic ServerError types.
pub fn from_sql_error(code: u32, message: &str) -> ServerError {
    match code {
        // Login failed
        18456 => ServerError::auth(format!("Login failed: {}", message)),

        // Cannot open database
        4060 => ServerError::connection(format!("Cannot open database: {}", message)),

        _ => ServerError::Operation {
            message: message.to_string(),
            sql_error_code: Some(code),
        },
    }
}

impl From<tiberius::error::Error> for ServerError {
    fn from(e: tiberius::error::Error) -> Self {
        use tiberius::error::Error;

        match &e {
            Error::Server(token) => from_sql_error(token.code(), token.message()),
            Error::Io { .. } => ServerError::connection(format!("IO error: {}", e)),
            Error::Tls(_) => ServerError::connection(format!("TLS error: {}", e)),
            Error::Protocol(_) => ServerError::connection(format!("Protocol error: {}", e)),
            Error::Routing { .. } => ServerError::connection(e.to_string()),
            Error::Conversion(_) => ServerError::operation(format!("Type conversion error: {}", e)),
            _ => ServerError::operation(e.to_string()),
        }
    }
}
