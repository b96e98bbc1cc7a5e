//! MSSQL data MCP server entry point.
//!
//! This binary starts the MCP server using stdio transport for integration
//! with Claude Desktop, VS Code, and other MCP clients.

use anyhow::Result;
use mssql_data_mcp::shutdown::{install_signal_handlers, ShutdownController};
use mssql_data_mcp::{Config, ConnectionManager, MssqlMcpServer};
use rmcp::ServiceExt;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is reserved for JSON-RPC)
    init_logging();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = "stdio",
        "MSSQL data MCP server starting"
    );

    let config = Config::from_env().inspect_err(|e| error!("{}", e))?;
    info!(
        host = %config.database.host,
        database = %config.database.database,
        auth = %config.auth_mode(),
        read_only = config.read_only,
        "Configuration loaded"
    );

    let connections = Arc::new(ConnectionManager::from_env()?);
    let server = MssqlMcpServer::new(&config, Arc::clone(&connections));

    let shutdown = Arc::new(ShutdownController::new());
    install_signal_handlers(Arc::clone(&shutdown));

    // Start serving on stdio transport
    let service = server.serve(rmcp::transport::stdio()).await?;
    info!("Server initialized. Ready to accept requests...");

    let mut shutdown_signal = shutdown.signal();
    let outcome = tokio::select! {
        quit_reason = service.waiting() => quit_reason.map(|reason| {
            info!("Service stopped: {:?}", reason);
        }),
        _ = shutdown_signal.recv() => {
            info!("Shutdown signal received");
            Ok(())
        }
    };

    shutdown.graceful_shutdown(&connections).await;
    outcome?;
    Ok(())
}

/// Initialize tracing subscriber with stderr output.
///
/// Logs MUST go to stderr because stdout is used for JSON-RPC communication.
fn init_logging() {
    let filter = std::env::var("RUST_LOG")
        .map(EnvFilter::new)
        .unwrap_or_else(|_| EnvFilter::new("warn,mssql_data_mcp=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}
