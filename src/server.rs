//! MCP server struct definition and initialization.

use crate::config::Config;
use crate::database::ConnectionManager;
use crate::dispatch::Dispatcher;
use crate::tools::ToolRegistry;
use std::sync::Arc;

/// The MSSQL data MCP server instance.
///
/// This struct is cloned for each request, but the dispatcher, and with it
/// the connection pool, is shared via Arc.
#[derive(Clone)]
pub struct MssqlMcpServer {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) database: String,
}

impl MssqlMcpServer {
    /// Create a server from configuration and a connection manager.
    ///
    /// No connection is opened here; the first tool call does that.
    pub fn new(config: &Config, connections: Arc<ConnectionManager>) -> Self {
        let registry = ToolRegistry::standard(config.max_result_rows);
        Self {
            dispatcher: Arc::new(Dispatcher::new(registry, connections, config.read_only)),
            database: config.database.database.clone(),
        }
    }

    /// Create a server around an existing dispatcher.
    pub fn with_dispatcher(dispatcher: Arc<Dispatcher>, database: impl Into<String>) -> Self {
        Self {
            dispatcher,
            database: database.into(),
        }
    }

    /// The tool dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}
