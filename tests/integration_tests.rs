//! Integration tests for the MSSQL data MCP server.
//!
//! These tests support two modes:
//! 1. **Testcontainers** (default): Automatically spins up SQL Server containers
//! 2. **External server**: Connect to existing server via MSSQL_HOST env var
//!
//! ## Running with testcontainers (requires Docker):
//! ```bash
//! cargo test --test integration_tests -- --ignored --test-threads=1
//! ```
//!
//! ## Running against external server (e.g., CI service container):
//! ```bash
//! MSSQL_HOST=localhost MSSQL_PORT=1433 MSSQL_PASSWORD='yourPass' \
//!   cargo test --test integration_tests -- --ignored --test-threads=1
//! ```
//!
//! ## Testing against a specific SQL Server version:
//! ```bash
//! MSSQL_TEST_VERSION=2022-latest cargo test --test integration_tests -- --ignored
//! ```
//!
//! Note: SQL Server container requires ~2GB RAM and takes 30-60 seconds to start.

use mssql_data_mcp::database::{
    AzureCliTokenProvider, ConnectionAuth, ConnectionConfig, ConnectionManager, SqlExecutor,
    SqlValue, TiberiusConnector, TiberiusPool,
};
use mssql_data_mcp::dispatch::Dispatcher;
use mssql_data_mcp::tools::ToolRegistry;
use mssql_data_mcp::ToolResponse;
use serde_json::{json, Value};
use serial_test::serial;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync, ImageExt};
use testcontainers_modules::mssql_server::MssqlServer;
use tiberius::{Client, Config};
use tokio::net::TcpStream;
use tokio_util::compat::TokioAsyncWriteCompatExt;

/// SA password used for containers started by these tests.
const SA_PASSWORD: &str = "Data(!)Mcp_Test1";

/// Image tags the suite is run against; `MSSQL_TEST_VERSION` picks one.
pub mod versions {
    pub const SQL_SERVER_2022: &str = "2022-latest";
    pub const SQL_SERVER_2019: &str = "2019-latest";

    pub const DEFAULT: &str = SQL_SERVER_2022;
}

fn test_version() -> String {
    std::env::var("MSSQL_TEST_VERSION").unwrap_or_else(|_| versions::DEFAULT.to_string())
}

/// Where the test server comes from.
#[allow(dead_code)] // The container is stopped when dropped
enum ServerSource {
    /// `MSSQL_HOST` points at a running server.
    External,
    Container(Box<ContainerAsync<MssqlServer>>),
}

/// A reachable SQL Server plus the settings the MCP server needs for it.
struct TestServer {
    #[allow(dead_code)]
    source: ServerSource,
    host: String,
    port: u16,
    password: String,
}

impl TestServer {
    async fn start() -> Self {
        match std::env::var("MSSQL_HOST") {
            Ok(host) => {
                let port = std::env::var("MSSQL_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(1433);
                let password =
                    std::env::var("MSSQL_PASSWORD").unwrap_or_else(|_| SA_PASSWORD.to_string());
                eprintln!("Using external SQL Server at {}:{}", host, port);
                Self {
                    source: ServerSource::External,
                    host,
                    port,
                    password,
                }
            }
            Err(_) => Self::from_container(&test_version()).await,
        }
    }

    async fn from_container(version: &str) -> Self {
        eprintln!("Starting SQL Server {} container...", version);

        let container = MssqlServer::default()
            .with_sa_password(SA_PASSWORD)
            .with_accept_eula()
            .with_tag(version)
            .start()
            .await
            .unwrap_or_else(|e| panic!("Failed to start SQL Server {} container: {}", version, e));

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(1433)
            .await
            .expect("Failed to get port");

        // The login endpoint comes up shortly after the port opens
        tokio::time::sleep(Duration::from_secs(5)).await;

        Self {
            source: ServerSource::Container(Box::new(container)),
            host: host.to_string(),
            port,
            password: SA_PASSWORD.to_string(),
        }
    }

    /// Settings as the server would read them from its environment.
    fn settings(&self) -> HashMap<String, String> {
        [
            ("SERVER_NAME", format!("{},{}", self.host, self.port)),
            ("DATABASE_NAME", "master".to_string()),
            ("SQL_USERNAME", "sa".to_string()),
            ("SQL_PASSWORD", self.password.clone()),
            ("TRUST_SERVER_CERTIFICATE", "true".to_string()),
            ("ENCRYPT", "false".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn dispatcher(&self, read_only: bool) -> Dispatcher {
        let connections = ConnectionManager::new(
            Arc::new(self.settings()),
            Arc::new(AzureCliTokenProvider::new()),
            Arc::new(TiberiusConnector),
        );
        Dispatcher::new(ToolRegistry::standard(100), Arc::new(connections), read_only)
    }

    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            database: "master".to_string(),
            auth: ConnectionAuth::Static {
                username: "sa".to_string(),
                password: self.password.clone().into(),
            },
            encrypt: false,
            trust_server_certificate: true,
            connect_timeout: Duration::from_secs(30),
            query_timeout: Duration::from_secs(30),
            application_name: "mssql-data-mcp-tests".to_string(),
            max_connections: 2,
            idle_timeout: Duration::from_secs(60),
        }
    }

    /// A raw tiberius client, for checking results independently of the server.
    async fn client(&self) -> Client<tokio_util::compat::Compat<TcpStream>> {
        let mut config = Config::new();
        config.host(&self.host);
        config.port(self.port);
        config.authentication(tiberius::AuthMethod::sql_server("sa", &self.password));
        config.trust_cert();

        let tcp = TcpStream::connect(format!("{}:{}", self.host, self.port))
            .await
            .expect("Failed to connect to TCP");
        tcp.set_nodelay(true).expect("Failed to set TCP_NODELAY");

        Client::connect(config, tcp.compat_write())
            .await
            .expect("Failed to connect to SQL Server")
    }
}

fn body(response: &ToolResponse) -> Value {
    assert!(!response.is_error, "tool error: {}", response.text_content());
    serde_json::from_str(&response.text_content()).unwrap()
}

// =============================================================================
// Tool Workflow Tests
// =============================================================================

mod tool_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_table_lifecycle() {
        let server = TestServer::start().await;
        let dispatcher = server.dispatcher(false);

        let created = body(
            &dispatcher
                .dispatch(
                    "create_table",
                    Some(json!({
                        "tableName": "McpPeople",
                        "columns": [
                            {"name": "id", "type": "INT PRIMARY KEY"},
                            {"name": "name", "type": "NVARCHAR(100)"},
                            {"name": "age", "type": "INT NULL"}
                        ]
                    })),
                )
                .await,
        );
        assert_eq!(created["success"], json!(true));

        let inserted = body(
            &dispatcher
                .dispatch(
                    "insert_data",
                    Some(json!({
                        "tableName": "McpPeople",
                        "data": [
                            {"age": 31, "id": 1, "name": "Ann"},
                            {"age": null, "id": 2, "name": "O'Brien"}
                        ]
                    })),
                )
                .await,
        );
        assert_eq!(inserted["recordsInserted"], json!(2));

        let read = body(
            &dispatcher
                .dispatch(
                    "read_data",
                    Some(json!({"query": "SELECT id, name, age FROM McpPeople ORDER BY id"})),
                )
                .await,
        );
        assert_eq!(read["recordCount"], json!(2));
        assert_eq!(
            read["data"],
            json!([
                {"id": 1, "name": "Ann", "age": 31},
                {"id": 2, "name": "O'Brien", "age": null}
            ])
        );

        let updated = body(
            &dispatcher
                .dispatch(
                    "update_data",
                    Some(json!({
                        "tableName": "McpPeople",
                        "updates": {"age": 40},
                        "whereClause": "id = 2"
                    })),
                )
                .await,
        );
        assert_eq!(updated["rowsAffected"], json!(1));

        let described = body(
            &dispatcher
                .dispatch("describe_table", Some(json!({"tableName": "dbo.McpPeople"})))
                .await,
        );
        assert_eq!(
            described["columns"],
            json!([
                {"name": "id", "type": "int"},
                {"name": "name", "type": "nvarchar"},
                {"name": "age", "type": "int"}
            ])
        );

        let listed = body(
            &dispatcher
                .dispatch("list_table", Some(json!({"parameters": ["dbo"]})))
                .await,
        );
        let items = listed["items"].as_array().unwrap();
        assert!(items.contains(&json!({"name": "dbo.McpPeople"})));

        let indexed = body(
            &dispatcher
                .dispatch(
                    "create_index",
                    Some(json!({
                        "tableName": "McpPeople",
                        "indexName": "IX_McpPeople_Name",
                        "columns": ["name"]
                    })),
                )
                .await,
        );
        assert_eq!(indexed["success"], json!(true));

        let dropped = body(
            &dispatcher
                .dispatch("drop_table", Some(json!({"tableName": "McpPeople"})))
                .await,
        );
        assert_eq!(dropped["success"], json!(true));

        let mut client = server.client().await;
        let remaining = client
            .query("SELECT COUNT(*) FROM sys.tables WHERE name = 'McpPeople'", &[])
            .await
            .unwrap()
            .into_row()
            .await
            .unwrap()
            .and_then(|row| row.get::<i32, _>(0));
        assert_eq!(remaining, Some(0));

        dispatcher.connections().close().await;
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_read_only_rejects_writes() {
        let server = TestServer::start().await;
        let dispatcher = server.dispatcher(true);

        let response = dispatcher
            .dispatch("drop_table", Some(json!({"tableName": "spt_values"})))
            .await;
        assert!(response.is_error);

        let read = body(
            &dispatcher
                .dispatch("read_data", Some(json!({"query": "SELECT 1 AS one"})))
                .await,
        );
        assert_eq!(read["data"], json!([{"one": 1}]));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_describe_missing_table() {
        let server = TestServer::start().await;
        let dispatcher = server.dispatcher(false);

        let described = body(
            &dispatcher
                .dispatch("describe_table", Some(json!({"tableName": "NoSuchTable"})))
                .await,
        );
        assert_eq!(described["success"], json!(false));
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_bad_password_fails_generically() {
        let server = TestServer::start().await;
        let mut settings = server.settings();
        settings.insert("SQL_PASSWORD".to_string(), "wrong-password".to_string());
        let connections = ConnectionManager::new(
            Arc::new(settings),
            Arc::new(AzureCliTokenProvider::new()),
            Arc::new(TiberiusConnector),
        );
        let dispatcher = Dispatcher::new(ToolRegistry::standard(10), Arc::new(connections), false);

        let response = dispatcher.dispatch("list_table", None).await;
        assert!(response.is_error);
        assert!(!response.text_content().contains("wrong-password"));
    }
}

// =============================================================================
// Driver Tests
// =============================================================================

mod driver_tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_type_mapping() {
        let server = TestServer::start().await;
        let pool = TiberiusPool::connect(&server.connection_config())
            .await
            .expect("Failed to open pool");

        let result = pool
            .query(
                "SELECT CAST(42 AS INT) AS i, CAST(1 AS BIT) AS b, N'text' AS s, \
                 CAST(NULL AS INT) AS n, CAST(12.50 AS DECIMAL(10,2)) AS d",
                &[],
                10,
            )
            .await
            .unwrap();

        let row = &result.rows[0];
        assert_eq!(row.get("i"), Some(&SqlValue::I64(42)));
        assert_eq!(row.get("b"), Some(&SqlValue::Bool(true)));
        assert_eq!(row.get("s").and_then(SqlValue::as_str), Some("text"));
        assert!(row.get("n").is_some_and(SqlValue::is_null));
        assert_eq!(
            serde_json::to_value(row.get("d").unwrap()).unwrap(),
            json!("12.50")
        );
        assert_eq!(result.columns.len(), 5);
    }

    #[tokio::test]
    #[ignore = "requires Docker"]
    #[serial]
    async fn test_row_limit_truncates() {
        let server = TestServer::start().await;
        let pool = TiberiusPool::connect(&server.connection_config())
            .await
            .expect("Failed to open pool");

        let result = pool
            .query(
                "SELECT TOP 20 number FROM master..spt_values WHERE type = 'P' ORDER BY number",
                &[],
                5,
            )
            .await
            .unwrap();

        assert_eq!(result.rows.len(), 5);
        assert!(result.truncated);

        pool.close().await;
        assert!(!pool.is_connected());
    }
}
