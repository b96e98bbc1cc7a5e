//! Connection lifecycle management.
//!
//! [`ConnectionManager`] owns the single current pool and, in Azure AD mode, the
//! token it was opened with. Every tool call goes through
//! [`ConnectionManager::ensure_connection`], which reuses the pool while it is
//! healthy and otherwise replaces it.

use crate::config::{AuthMode, ProcessEnv, SettingsSource};
use crate::constants::{
    STATIC_CONNECTION_FAILED, TOKEN_CONNECTION_FAILED, TOKEN_REFRESH_MARGIN_SECS,
};
use crate::database::auth::{CredentialResolver, TokenProvider, TokenState};
use crate::database::driver::{Connector, SqlExecutor, TiberiusConnector};
use crate::error::ServerError;
use crate::security::redact_secret;
use chrono::Duration as ChronoDuration;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

#[derive(Default)]
struct ConnectionState {
    pool: Option<Arc<dyn SqlExecutor>>,
    token: Option<TokenState>,
}

/// Keeps exactly one healthy pool alive across tool calls.
pub struct ConnectionManager {
    source: Arc<dyn SettingsSource>,
    resolver: CredentialResolver,
    connector: Arc<dyn Connector>,
    state: Mutex<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(
        source: Arc<dyn SettingsSource>,
        tokens: Arc<dyn TokenProvider>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            resolver: CredentialResolver::new(Arc::clone(&source), tokens),
            source,
            connector,
            state: Mutex::new(ConnectionState::default()),
        }
    }

    /// Production wiring: process environment, default token provider, tiberius pools.
    pub fn from_env() -> Result<Self, ServerError> {
        Ok(Self::new(
            Arc::new(ProcessEnv),
            default_token_provider()?,
            Arc::new(TiberiusConnector),
        ))
    }

    /// Return a healthy pool, opening or replacing it as needed.
    ///
    /// The authentication mode is re-derived from the settings on every call.
    /// Failures are logged with credentials redacted; the returned error carries
    /// only a generic message.
    pub async fn ensure_connection(&self) -> Result<Arc<dyn SqlExecutor>, ServerError> {
        let mut state = self.state.lock().await;
        let mode = AuthMode::detect(self.source.as_ref());

        let reusable = match mode {
            AuthMode::Static => state.pool.as_ref().filter(|pool| pool.is_connected()),
            AuthMode::Token => {
                let margin = ChronoDuration::seconds(TOKEN_REFRESH_MARGIN_SECS);
                let token_valid = state
                    .token
                    .as_ref()
                    .is_some_and(|token| token.is_valid_for(margin));
                state
                    .pool
                    .as_ref()
                    .filter(|pool| token_valid && pool.is_connected())
            }
        };
        if let Some(pool) = reusable {
            return Ok(Arc::clone(pool));
        }

        match self.reconnect(&mut state).await {
            Ok(pool) => {
                info!(auth = %mode, "Database connection established");
                Ok(pool)
            }
            Err(e) => {
                let password = self.source.get("SQL_PASSWORD").unwrap_or_default();
                let message = match mode {
                    AuthMode::Static => STATIC_CONNECTION_FAILED,
                    AuthMode::Token => TOKEN_CONNECTION_FAILED,
                };
                error!(
                    auth = %mode,
                    error = %redact_secret(&e.detail(), &password),
                    "{}",
                    message
                );
                Err(ServerError::connection(message))
            }
        }
    }

    /// Resolve fresh credentials and swap in a new pool.
    async fn reconnect(
        &self,
        state: &mut ConnectionState,
    ) -> Result<Arc<dyn SqlExecutor>, ServerError> {
        let (config, token) = self.resolver.resolve().await?;
        // Static mode resolves no token, which clears any cached one
        state.token = token;

        // A caller still holding the old pool from an earlier call gets
        // "Connection pool is closed" on its next statement. Statements already
        // running on a checked-out connection complete.
        if let Some(old) = state.pool.take() {
            debug!("Closing superseded connection pool");
            old.close().await;
        }

        let pool = self.connector.connect(&config).await?;
        state.pool = Some(Arc::clone(&pool));
        Ok(pool)
    }

    /// Close and forget the current pool and token.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        state.token = None;
        if let Some(pool) = state.pool.take() {
            pool.close().await;
            info!("Database connection closed");
        }
    }
}

#[cfg(not(feature = "azure-auth"))]
fn default_token_provider() -> Result<Arc<dyn TokenProvider>, ServerError> {
    Ok(Arc::new(crate::database::auth::AzureCliTokenProvider::new()))
}

#[cfg(feature = "azure-auth")]
fn default_token_provider() -> Result<Arc<dyn TokenProvider>, ServerError> {
    Ok(Arc::new(
        crate::database::auth::AzureIdentityTokenProvider::new()?,
    ))
}
