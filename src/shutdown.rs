//! Graceful shutdown handling.
//!
//! Signals (Ctrl+C, SIGTERM) flip a watch channel; the entry point waits on it
//! alongside the MCP service and then closes the connection pool within
//! [`SHUTDOWN_TIMEOUT`].

use crate::constants::SHUTDOWN_TIMEOUT;
use crate::database::ConnectionManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Shutdown signal that can be awaited.
#[derive(Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Wait for the shutdown signal.
    pub async fn recv(&mut self) {
        let _ = self.receiver.wait_for(|&v| v).await;
    }

    /// Check if shutdown has been signaled without blocking.
    pub fn is_shutdown(&self) -> bool {
        *self.receiver.borrow()
    }
}

/// Controller for managing graceful shutdown.
pub struct ShutdownController {
    sender: watch::Sender<bool>,
    shutting_down: AtomicBool,
    close_timeout: Duration,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Create a new shutdown controller with the default close timeout.
    pub fn new() -> Self {
        Self::with_timeout(SHUTDOWN_TIMEOUT)
    }

    /// Create a shutdown controller with a custom close timeout.
    pub fn with_timeout(close_timeout: Duration) -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
            shutting_down: AtomicBool::new(false),
            close_timeout,
        }
    }

    /// Get a shutdown signal receiver.
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Check if shutdown is in progress.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Initiate shutdown. Only the first call has any effect.
    pub fn shutdown(&self) {
        if self
            .shutting_down
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Initiating graceful shutdown...");
            let _ = self.sender.send(true);
        }
    }

    /// Signal shutdown and close the connection pool.
    pub async fn graceful_shutdown(&self, connections: &ConnectionManager) {
        self.shutdown();

        if tokio::time::timeout(self.close_timeout, connections.close())
            .await
            .is_err()
        {
            warn!(
                "Closing the connection pool did not finish within {}s",
                self.close_timeout.as_secs()
            );
        }

        info!("Graceful shutdown complete");
    }
}

/// Shared shutdown controller.
pub type SharedShutdownController = Arc<ShutdownController>;

/// Install signal handlers that trigger `controller`.
pub fn install_signal_handlers(controller: SharedShutdownController) {
    let ctrl_c_controller = Arc::clone(&controller);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, initiating shutdown...");
                ctrl_c_controller.shutdown();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C signal: {}", e);
            }
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, initiating shutdown...");
                controller.shutdown();
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    });

    #[cfg(not(unix))]
    drop(controller);
}
