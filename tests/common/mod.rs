//! Shared fixtures for the mock-driven integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mssql_data_mcp::config::SettingsSource;
use mssql_data_mcp::database::{
    AccessToken, ConnectionAuth, ConnectionConfig, ConnectionManager, Connector, QueryResult,
    ResultRow, SqlExecutor, SqlParam, TokenProvider,
};
use mssql_data_mcp::dispatch::Dispatcher;
use mssql_data_mcp::tools::ToolRegistry;
use mssql_data_mcp::ServerError;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Settings for SQL authentication against a fake server.
pub const STATIC_SETTINGS: &[(&str, &str)] = &[
    ("SERVER_NAME", "db.example.test"),
    ("DATABASE_NAME", "appdb"),
    ("SQL_USERNAME", "app"),
    ("SQL_PASSWORD", "secret123"),
];

/// Settings for Azure AD token authentication.
pub const TOKEN_SETTINGS: &[(&str, &str)] = &[
    ("SERVER_NAME", "db.example.test"),
    ("DATABASE_NAME", "appdb"),
];

pub fn settings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// A settings source whose values can change between calls.
#[derive(Default)]
pub struct MutableSettings {
    values: Mutex<HashMap<String, String>>,
}

impl MutableSettings {
    pub fn new(pairs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            values: Mutex::new(settings(pairs)),
        })
    }

    pub fn replace(&self, pairs: &[(&str, &str)]) {
        *self.values.lock().unwrap() = settings(pairs);
    }
}

impl SettingsSource for MutableSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }
}

/// An in-memory pool that records every statement.
#[derive(Default)]
pub struct MockPool {
    connected: AtomicBool,
    closed: AtomicBool,
    statements: Mutex<Vec<(String, Vec<SqlParam>)>>,
    rows: Mutex<Vec<ResultRow>>,
    failure: Mutex<Option<String>>,
    rows_affected: AtomicUsize,
}

impl MockPool {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            rows_affected: AtomicUsize::new(1),
            ..Default::default()
        }
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    pub fn was_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn statements(&self) -> Vec<(String, Vec<SqlParam>)> {
        self.statements.lock().unwrap().clone()
    }

    pub fn set_rows(&self, rows: Vec<ResultRow>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn set_rows_affected(&self, count: usize) {
        self.rows_affected.store(count, Ordering::SeqCst);
    }

    /// Make every following statement fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    fn record(&self, sql: &str, params: &[SqlParam]) -> Result<(), ServerError> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
        match self.failure.lock().unwrap().as_ref() {
            Some(message) => Err(ServerError::operation(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SqlExecutor for MockPool {
    async fn query(
        &self,
        sql: &str,
        params: &[SqlParam],
        max_rows: usize,
    ) -> Result<QueryResult, ServerError> {
        self.record(sql, params)?;
        let mut rows = self.rows.lock().unwrap().clone();
        let truncated = rows.len() > max_rows;
        rows.truncate(max_rows);
        let mut result = QueryResult::from_rows(rows);
        result.truncated = truncated;
        Ok(result)
    }

    async fn execute(&self, sql: &str, params: &[SqlParam]) -> Result<u64, ServerError> {
        self.record(sql, params)?;
        Ok(self.rows_affected.load(Ordering::SeqCst) as u64)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out [`MockPool`]s and remembers each one.
#[derive(Default)]
pub struct MockConnector {
    pools: Mutex<Vec<Arc<MockPool>>>,
    configs: Mutex<Vec<ConnectionConfig>>,
    failure: Mutex<Option<String>>,
    rows: Mutex<Vec<ResultRow>>,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect_count(&self) -> usize {
        self.pools.lock().unwrap().len()
    }

    pub fn pool(&self, index: usize) -> Arc<MockPool> {
        Arc::clone(&self.pools.lock().unwrap()[index])
    }

    pub fn last_pool(&self) -> Arc<MockPool> {
        let pools = self.pools.lock().unwrap();
        Arc::clone(pools.last().expect("no pool was opened"))
    }

    pub fn last_config(&self) -> ConnectionConfig {
        let configs = self.configs.lock().unwrap();
        configs.last().cloned().expect("no connection was attempted")
    }

    /// Rows every new pool returns from queries.
    pub fn set_rows(&self, rows: Vec<ResultRow>) {
        *self.rows.lock().unwrap() = rows;
    }

    /// Make every following connect attempt fail with `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn SqlExecutor>, ServerError> {
        self.configs.lock().unwrap().push(config.clone());
        if let Some(message) = self.failure.lock().unwrap().as_ref() {
            return Err(ServerError::connection(message.clone()));
        }
        let pool = Arc::new(MockPool::new());
        pool.set_rows(self.rows.lock().unwrap().clone());
        self.pools.lock().unwrap().push(Arc::clone(&pool));
        Ok(pool)
    }
}

/// Issues tokens that expire at a configurable time.
pub struct MockTokenProvider {
    calls: AtomicUsize,
    expires_on: Mutex<Option<DateTime<Utc>>>,
}

impl MockTokenProvider {
    pub fn new(expires_on: Option<DateTime<Utc>>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            expires_on: Mutex::new(expires_on),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_expiry(&self, expires_on: Option<DateTime<Utc>>) {
        *self.expires_on.lock().unwrap() = expires_on;
    }
}

#[async_trait]
impl TokenProvider for MockTokenProvider {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken, ServerError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken {
            token: format!("token-{}", n).into(),
            expires_on: *self.expires_on.lock().unwrap(),
        })
    }
}

/// Whether a connection config carries SQL credentials.
pub fn uses_static_auth(config: &ConnectionConfig) -> bool {
    matches!(config.auth, ConnectionAuth::Static { .. })
}

pub struct Harness {
    pub connector: Arc<MockConnector>,
    pub tokens: Arc<MockTokenProvider>,
    pub connections: Arc<ConnectionManager>,
}

impl Harness {
    pub fn new(source: Arc<dyn SettingsSource>) -> Self {
        let connector = MockConnector::new();
        let tokens = MockTokenProvider::new(None);
        let connections = Arc::new(ConnectionManager::new(
            source,
            Arc::clone(&tokens) as Arc<dyn TokenProvider>,
            Arc::clone(&connector) as Arc<dyn Connector>,
        ));
        Self {
            connector,
            tokens,
            connections,
        }
    }

    pub fn with_settings(pairs: &[(&str, &str)]) -> Self {
        Self::new(Arc::new(settings(pairs)))
    }

    pub fn dispatcher(&self, read_only: bool) -> Dispatcher {
        Dispatcher::new(
            ToolRegistry::standard(100),
            Arc::clone(&self.connections),
            read_only,
        )
    }
}

/// Captures formatted log output for assertions.
#[derive(Clone, Default)]
pub struct LogBuffer {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }

    /// Install as the thread's default subscriber until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
