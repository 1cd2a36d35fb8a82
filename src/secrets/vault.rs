//! HashiCorp Vault broker implementation.
//!
//! Mount management goes through `vaultrs`; logical reads and writes go
//! straight to the HTTP API (`/v1/<path>`) because the Google Cloud secrets
//! engine has no typed endpoints in `vaultrs`.
//!
//! # Configuration
//!
//! - Vault server address (HTTPS recommended)
//! - Token with permission to mount engines and write under them
//! - Optional namespace for Vault Enterprise
//!
//! # Example
//!
//! ```rust,ignore
//! use credflow::secrets::{VaultBroker, VaultConfig};
//!
//! let broker = VaultBroker::connect(VaultConfig {
//!     address: "https://vault.example.com:8200".to_string(),
//!     token: Some("hvs.token".into()),
//!     ..Default::default()
//! })
//! .await?;
//! broker.create_mount("gcp/my-project", "gcp").await?;
//! ```

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;

use super::broker::{BrokerError, Result, SecretData, SecretsBroker};
use super::types::SecretString;

/// Connection settings for [`VaultBroker`].
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address (e.g., "https://vault.example.com:8200")
    pub address: String,

    /// Vault token; needs `sys/mounts` and engine write capabilities
    pub token: Option<SecretString>,

    /// Vault namespace (for Enterprise multi-tenancy)
    pub namespace: Option<String>,

    /// Per-request timeout for logical reads and writes
    pub request_timeout: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: "http://127.0.0.1:8200".to_string(),
            token: None,
            namespace: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Error body Vault attaches to non-2xx answers.
#[derive(Debug, Default, Deserialize)]
struct VaultErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Envelope of a successful logical read.
#[derive(Debug, Deserialize)]
struct VaultReadResponse {
    #[serde(default)]
    data: Option<SecretData>,
}

/// Vault-backed [`SecretsBroker`].
///
/// Each orchestrator owns its own instance; nothing is shared between
/// instances.
pub struct VaultBroker {
    client: VaultClient,
    http: reqwest::Client,
    address: String,
    token: Option<SecretString>,
    namespace: Option<String>,
}

impl std::fmt::Debug for VaultBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultBroker")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("token", &self.token)
            .field("client", &"[VaultClient]")
            .finish()
    }
}

impl VaultBroker {
    /// Builds the client without contacting Vault.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::InvalidConfig`] if the address is empty or the client
    ///   cannot be constructed
    pub fn new(config: VaultConfig) -> Result<Self> {
        if config.address.trim().is_empty() {
            return Err(BrokerError::invalid_config("Vault address cannot be empty"));
        }

        let address = config.address.trim_end_matches('/').to_string();
        let client = build_vault_client(&address, config.token.as_ref(), config.namespace.as_deref())?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BrokerError::invalid_config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, http, address, token: config.token, namespace: config.namespace })
    }

    /// Builds the client and verifies Vault is reachable, initialized and unsealed.
    pub async fn connect(config: VaultConfig) -> Result<Self> {
        let broker = Self::new(config)?;
        broker.health().await?;
        Ok(broker)
    }

    /// Runs Vault's health check.
    pub async fn health(&self) -> Result<()> {
        match vaultrs::sys::health(&self.client).await {
            Ok(health) => {
                info!(
                    address = %self.address,
                    version = %health.version,
                    sealed = health.sealed,
                    "Successfully connected to Vault"
                );
                Ok(())
            }
            Err(e) => {
                error!(error = %e, address = %self.address, "Vault health check failed");
                Err(map_client_error(e, "sys/health"))
            }
        }
    }

    /// Forgets the broker access credential. Subsequent calls are anonymous.
    pub fn clear_token(&mut self) -> Result<()> {
        self.token = None;
        self.client = build_vault_client(&self.address, None, self.namespace.as_deref())?;
        debug!(address = %self.address, "Cleared Vault token");
        Ok(())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.address, path.trim_start_matches('/'));
        let mut builder = self.http.request(method, url);
        if let Some(token) = &self.token {
            builder = builder.header("X-Vault-Token", token.expose_secret());
        }
        if let Some(namespace) = &self.namespace {
            builder = builder.header("X-Vault-Namespace", namespace);
        }
        builder
    }
}

fn build_vault_client(
    address: &str,
    token: Option<&SecretString>,
    namespace: Option<&str>,
) -> Result<VaultClient> {
    let mut settings_builder = VaultClientSettingsBuilder::default();
    settings_builder.address(address);
    // Always set explicitly so the builder never falls back to VAULT_TOKEN.
    settings_builder.token(token.map(|t| t.expose_secret()).unwrap_or_default());

    if let Some(namespace) = namespace {
        settings_builder.namespace(Some(namespace.to_string()));
    }

    let settings = settings_builder
        .build()
        .map_err(|e| BrokerError::invalid_config(format!("Invalid Vault configuration: {}", e)))?;

    VaultClient::new(settings)
        .map_err(|e| BrokerError::invalid_config(format!("Failed to create Vault client: {}", e)))
}

fn map_client_error(err: ClientError, path: &str) -> BrokerError {
    match err {
        ClientError::APIError { code, errors } => BrokerError::from_status(code, errors, path),
        other @ ClientError::RestClientError { .. } => {
            let detail = std::error::Error::source(&other)
                .map(|source| source.to_string())
                .unwrap_or_else(|| other.to_string());
            BrokerError::transport(detail)
        }
        other => BrokerError::malformed(other.to_string()),
    }
}

fn map_send_error(err: reqwest::Error) -> BrokerError {
    if err.is_builder() {
        BrokerError::invalid_config(err.to_string())
    } else {
        BrokerError::transport(err.to_string())
    }
}

fn parse_errors(body: String) -> Vec<String> {
    serde_json::from_str::<VaultErrorBody>(&body)
        .map(|b| b.errors)
        .unwrap_or_else(|_| if body.is_empty() { Vec::new() } else { vec![body] })
}

async fn error_from_response(response: reqwest::Response, path: &str) -> BrokerError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    BrokerError::from_status(status, parse_errors(body), path)
}

#[async_trait]
impl SecretsBroker for VaultBroker {
    async fn create_mount(&self, path: &str, engine_type: &str) -> Result<()> {
        vaultrs::sys::mount::enable(&self.client, path, engine_type, None).await.map_err(|e| {
            let mapped = map_client_error(e, path);
            warn!(path = %path, engine_type = %engine_type, error = %mapped, "Vault mount failed");
            mapped
        })?;

        info!(path = %path, engine_type = %engine_type, "Mounted secrets engine");
        Ok(())
    }

    async fn write(&self, path: &str, data: &SecretData) -> Result<()> {
        let response =
            self.request(Method::POST, path).json(data).send().await.map_err(map_send_error)?;

        if !response.status().is_success() {
            let err = error_from_response(response, path).await;
            warn!(path = %path, error = %err, "Vault write failed");
            return Err(err);
        }

        debug!(path = %path, keys = data.len(), "Wrote to Vault");
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<SecretData>> {
        let response = self.request(Method::GET, path).send().await.map_err(map_send_error)?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                debug!(path = %path, "No data at Vault path");
                Ok(None)
            }
            // A bare 404 means nothing is there yet. One carrying errors
            // ("no handler for route") means nothing is mounted.
            StatusCode::NOT_FOUND => {
                let errors = parse_errors(response.text().await.unwrap_or_default());
                if errors.is_empty() {
                    debug!(path = %path, "No data at Vault path");
                    return Ok(None);
                }
                let err = BrokerError::from_status(StatusCode::NOT_FOUND.as_u16(), errors, path);
                warn!(path = %path, error = %err, "Vault read failed");
                Err(err)
            }
            status if status.is_success() => {
                let body = response.text().await.map_err(map_send_error)?;
                let parsed: VaultReadResponse = serde_json::from_str(&body).map_err(|e| {
                    BrokerError::malformed(format!("Invalid JSON from Vault at '{}': {}", path, e))
                })?;
                Ok(parsed.data)
            }
            _ => {
                let err = error_from_response(response, path).await;
                warn!(path = %path, error = %err, "Vault read failed");
                Err(err)
            }
        }
    }
}
