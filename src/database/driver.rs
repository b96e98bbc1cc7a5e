//! SQL Server driver seam and its tiberius + bb8 implementation.

use crate::database::auth::{ConnectionAuth, ConnectionConfig};
use crate::database::query::{collect_rows, truncate_for_log, QueryResult};
use crate::database::types::SqlParam;
use crate::error::ServerError;
use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_tiberius::ConnectionManager as TiberiusManager;
use secrecy::ExposeSecret;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tiberius::{AuthMethod, Config, EncryptionLevel, ToSql};
use tracing::{debug, info, instrument};

/// Executes parameterized statements against one connection pool.
///
/// Parameters are bound positionally as `@P1..@Pn`.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Run a statement that returns rows, keeping at most `max_rows`.
    async fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
        max_rows: usize,
    ) -> Result<QueryResult, ServerError>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, ServerError>;

    /// Whether the pool still holds live connections.
    fn is_connected(&self) -> bool;

    /// Close the pool. Further statements fail.
    async fn close(&self);
}

/// Opens connection pools.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn SqlExecutor>, ServerError>;
}

/// Opens bb8 pools of tiberius connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct TiberiusConnector;

#[async_trait]
impl Connector for TiberiusConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn SqlExecutor>, ServerError> {
        let pool = TiberiusPool::connect(config).await?;
        Ok(Arc::new(pool))
    }
}

/// Build a tiberius configuration from connection settings.
fn tiberius_config(config: &ConnectionConfig) -> Config {
    let mut tds = Config::new();

    tds.host(&config.host);
    tds.port(config.port);
    tds.database(&config.database);
    tds.application_name(&config.application_name);

    if config.encrypt {
        tds.encryption(EncryptionLevel::Required);
    } else {
        tds.encryption(EncryptionLevel::Off);
    }

    if config.trust_server_certificate {
        tds.trust_cert();
    }

    match &config.auth {
        ConnectionAuth::Static { username, password } => {
            tds.authentication(AuthMethod::sql_server(username, password.expose_secret()));
        }
        ConnectionAuth::Token { token } => {
            tds.authentication(AuthMethod::aad_token(token.expose_secret()));
        }
    }

    tds
}

/// A bb8 pool of tiberius connections.
pub struct TiberiusPool {
    pool: Pool<TiberiusManager>,
    query_timeout: Duration,
    closed: AtomicBool,
}

impl TiberiusPool {
    /// Create the pool and verify connectivity with a test query.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, ServerError> {
        info!(
            "Creating connection pool for {}:{}/{} (max: {})",
            config.host, config.port, config.database, config.max_connections
        );

        let manager = TiberiusManager::new(tiberius_config(config));
        let pool = Pool::builder()
            .max_size(config.max_connections)
            .min_idle(Some(1))
            .connection_timeout(config.connect_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .build(manager)
            .await
            .map_err(|e| ServerError::connection_with_source("Failed to create connection pool", e))?;

        let pool = Self {
            pool,
            query_timeout: config.query_timeout,
            closed: AtomicBool::new(false),
        };

        // Warm up the pool with a test query
        pool.query("SELECT 1", &[], 1)
            .await
            .map_err(|e| ServerError::connection_with_source("Failed to establish initial connection", e))?;
        debug!("Initial connection test successful");

        info!("Connection pool created successfully");
        Ok(pool)
    }

    async fn get(&self) -> Result<PooledConnection<'_, TiberiusManager>, ServerError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ServerError::connection("Connection pool is closed"));
        }

        self.pool
            .get()
            .await
            .map_err(|e| ServerError::connection(format!("Failed to get connection: {}", e)))
    }

    /// Run `fut` under the configured query timeout.
    async fn with_timeout<T>(
        &self,
        fut: impl Future<Output = Result<T, ServerError>>,
    ) -> Result<T, ServerError> {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| ServerError::timeout(self.query_timeout.as_secs()))?
    }
}

#[async_trait]
impl SqlExecutor for TiberiusPool {
    #[instrument(skip(self, params), fields(params = params.len()))]
    async fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
        max_rows: usize,
    ) -> Result<QueryResult, ServerError> {
        let start = Instant::now();
        debug!("Executing query: {}", truncate_for_log(sql, 200));

        let result = self
            .with_timeout(async {
                let mut conn = self.get().await?;
                let bound: Vec<&dyn ToSql> = params.iter().map(SqlParam::as_to_sql).collect();
                let stream = conn.query(sql, &bound).await?;
                collect_rows(stream, max_rows).await
            })
            .await?;

        debug!(
            "Query completed: {} rows in {} ms",
            result.rows.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    #[instrument(skip(self, params), fields(params = params.len()))]
    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, ServerError> {
        debug!("Executing statement: {}", truncate_for_log(sql, 200));

        let rows_affected = self
            .with_timeout(async {
                let mut conn = self.get().await?;
                let bound: Vec<&dyn ToSql> = params.iter().map(SqlParam::as_to_sql).collect();
                let result = conn.execute(sql, &bound).await?;
                Ok(result.total())
            })
            .await?;

        debug!("Statement completed: {} rows affected", rows_affected);
        Ok(rows_affected)
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire) && self.pool.state().connections > 0
    }

    async fn close(&self) {
        // bb8 tears connections down once the last pool handle is dropped
        self.closed.store(true, Ordering::Release);
        debug!("Connection pool closed");
    }
}
