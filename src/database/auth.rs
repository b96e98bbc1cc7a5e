//! Credential resolution for SQL Server connections.
//!
//! Two authentication modes are supported:
//! - SQL Server authentication (username/password from the settings)
//! - Azure AD access tokens, acquired through a [`TokenProvider`]
//!
//! The resolver re-reads the settings on every call, so a reconnect always
//! picks up the current values.

use crate::config::{Config, SettingsSource, StaticCredentials};
use crate::constants::{AZURE_SQL_SCOPE, TOKEN_FALLBACK_LIFETIME_SECS};
use crate::error::ServerError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDateTime, TimeZone, Utc};
use secrecy::SecretString;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Authentication carried by a [`ConnectionConfig`].
#[derive(Debug, Clone)]
pub enum ConnectionAuth {
    /// SQL Server login.
    Static {
        username: String,
        password: SecretString,
    },
    /// Azure AD bearer token.
    Token { token: SecretString },
}

/// Everything needed to open one connection pool.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub auth: ConnectionAuth,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub connect_timeout: Duration,
    pub query_timeout: Duration,
    pub application_name: String,
    pub max_connections: u32,
    pub idle_timeout: Duration,
}

/// A cached Azure AD token and its expiry.
#[derive(Debug, Clone)]
pub struct TokenState {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

impl TokenState {
    /// The bearer token.
    pub fn token(&self) -> &SecretString {
        &self.token
    }

    /// When the token stops being accepted.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the token is still valid `margin` from now.
    pub fn is_valid_for(&self, margin: ChronoDuration) -> bool {
        self.expires_at > Utc::now() + margin
    }
}

/// An access token as returned by an identity provider.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: SecretString,
    /// `None` when the provider does not report an expiry.
    pub expires_on: Option<DateTime<Utc>>,
}

/// Source of Azure AD access tokens.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Acquire a token for `scope`.
    async fn get_token(&self, scope: &str) -> Result<AccessToken, ServerError>;
}

/// Produces connection settings for the current authentication mode.
pub struct CredentialResolver {
    source: Arc<dyn SettingsSource>,
    tokens: Arc<dyn TokenProvider>,
}

impl CredentialResolver {
    pub fn new(source: Arc<dyn SettingsSource>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self { source, tokens }
    }

    /// Build a connection config from the current settings.
    ///
    /// Static credentials yield no [`TokenState`]; token authentication returns
    /// the acquired token's expiry, or `now + 30 minutes` when none is reported.
    ///
    /// # Errors
    ///
    /// `Config` when the settings are incomplete or the credential pair is
    /// asymmetric, `Authentication` when no token can be acquired.
    pub async fn resolve(&self) -> Result<(ConnectionConfig, Option<TokenState>), ServerError> {
        let config = Config::from_source(self.source.as_ref())?;
        let Config {
            database,
            query_timeout,
            ..
        } = config;

        let (auth, token_state) = match database.credentials {
            Some(StaticCredentials { username, password }) => {
                debug!(username = %username, "Using SQL Server authentication");
                (ConnectionAuth::Static { username, password }, None)
            }
            None => {
                debug!("Acquiring Azure AD access token");
                let access = self.tokens.get_token(AZURE_SQL_SCOPE).await?;
                let expires_at = access.expires_on.unwrap_or_else(|| {
                    Utc::now() + ChronoDuration::seconds(TOKEN_FALLBACK_LIFETIME_SECS)
                });
                debug!(expires_at = %expires_at, "Azure AD access token acquired");
                (
                    ConnectionAuth::Token {
                        token: access.token.clone(),
                    },
                    Some(TokenState {
                        token: access.token,
                        expires_at,
                    }),
                )
            }
        };

        let connection = ConnectionConfig {
            host: database.host,
            port: database.port,
            database: database.database,
            auth,
            encrypt: database.encrypt,
            trust_server_certificate: database.trust_server_certificate,
            connect_timeout: database.connection_timeout,
            query_timeout,
            application_name: database.application_name,
            max_connections: database.max_connections,
            idle_timeout: database.idle_timeout,
        };

        Ok((connection, token_state))
    }
}

/// Acquires tokens from the developer's Azure CLI sign-in.
#[derive(Debug, Clone)]
pub struct AzureCliTokenProvider {
    program: String,
}

impl Default for AzureCliTokenProvider {
    fn default() -> Self {
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self {
            program: program.to_string(),
        }
    }
}

impl AzureCliTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Output of `az account get-access-token --output json`.
#[derive(Debug, Deserialize)]
struct CliTokenResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    /// Unix seconds; reported by newer CLI versions.
    #[serde(rename = "expires_on", default)]
    expires_on_unix: Option<i64>,
    /// Local time, `2024-01-01 12:00:00.000000`.
    #[serde(rename = "expiresOn", default)]
    expires_on_local: Option<String>,
}

impl CliTokenResponse {
    fn expiry(&self) -> Option<DateTime<Utc>> {
        if let Some(secs) = self.expires_on_unix {
            return Utc.timestamp_opt(secs, 0).single();
        }
        let local = self.expires_on_local.as_deref()?;
        let naive = NaiveDateTime::parse_from_str(local.trim(), "%Y-%m-%d %H:%M:%S%.f").ok()?;
        Local
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[async_trait]
impl TokenProvider for AzureCliTokenProvider {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, ServerError> {
        let output = tokio::process::Command::new(&self.program)
            .args(["account", "get-access-token", "--scope", scope, "--output", "json"])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ServerError::auth(format!("Failed to run Azure CLI: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServerError::auth(format!(
                "Azure CLI token request failed: {}",
                stderr.trim()
            )));
        }

        parse_cli_token(&output.stdout)
    }
}

fn parse_cli_token(stdout: &[u8]) -> Result<AccessToken, ServerError> {
    let response: CliTokenResponse = serde_json::from_slice(stdout)
        .map_err(|e| ServerError::auth(format!("Unexpected Azure CLI output: {}", e)))?;

    if response.access_token.is_empty() {
        return Err(ServerError::auth("Azure CLI returned an empty access token"));
    }

    let expires_on = response.expiry();
    Ok(AccessToken {
        token: SecretString::from(response.access_token),
        expires_on,
    })
}

/// Acquires tokens through `azure_identity`'s Azure CLI credential.
#[cfg(feature = "azure-auth")]
pub struct AzureIdentityTokenProvider {
    credential: Arc<azure_identity::AzureCliCredential>,
}

#[cfg(feature = "azure-auth")]
impl AzureIdentityTokenProvider {
    pub fn new() -> Result<Self, ServerError> {
        let credential = azure_identity::AzureCliCredential::new(None)
            .map_err(|e| ServerError::auth(format!("Failed to create Azure credential: {}", e)))?;
        Ok(Self { credential })
    }
}

#[cfg(feature = "azure-auth")]
#[async_trait]
impl TokenProvider for AzureIdentityTokenProvider {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, ServerError> {
        use azure_core::credentials::TokenCredential;

        let token = self
            .credential
            .get_token(&[scope], None)
            .await
            .map_err(|e| ServerError::auth(format!("Failed to acquire Azure AD token: {}", e)))?;

        Ok(AccessToken {
            token: SecretString::from(token.token.secret().to_string()),
            expires_on: Utc
                .timestamp_opt(token.expires_on.unix_timestamp(), 0)
                .single(),
        })
    }
}
