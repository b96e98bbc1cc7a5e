//! Database connectivity and query execution.

pub mod auth;
mod connection;
mod driver;
mod query;
pub mod types;

pub use auth::{
    AccessToken, AzureCliTokenProvider, ConnectionAuth, ConnectionConfig, CredentialResolver,
    TokenProvider, TokenState,
};
#[cfg(feature = "azure-auth")]
pub use auth::AzureIdentityTokenProvider;
pub use connection::ConnectionManager;
pub use driver::{Connector, SqlExecutor, TiberiusConnector, TiberiusPool};
pub use query::{ColumnInfo, QueryResult, ResultRow};
pub use types::{SqlParam, SqlValue, TypeMapper};
