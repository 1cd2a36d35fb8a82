//! # Configuration Settings
//!
//! Defines the configuration structure for credflow.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;
use validator::Validate;

use crate::action::DEFAULT_COMPUTE_BASE_URL;
use crate::errors::{Error, Result};
use crate::provisioning::{PollSchedule, DEFAULT_ROLE_NAME};
use crate::secrets::{EngineType, SecretString, VaultConfig};
use crate::workflow::{MountConflictPolicy, WorkflowSettings};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Secrets broker connection
    #[validate(nested)]
    pub broker: BrokerConfig,

    /// Token wait bounds
    #[validate(nested)]
    pub token: TokenConfig,

    /// Workflow behaviour
    #[validate(nested)]
    pub workflow: WorkflowConfig,

    /// Downstream action
    #[validate(nested)]
    pub action: ActionConfig,

    /// Log output
    #[validate(nested)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(Error::from)?;
        self.validate_custom()
    }

    fn validate_custom(&self) -> Result<()> {
        let address = Url::parse(&self.broker.address).map_err(|e| {
            Error::validation_field(
                format!("Broker address '{}' is not a URL: {}", self.broker.address, e),
                "broker.address",
            )
        })?;
        if !matches!(address.scheme(), "http" | "https") {
            return Err(Error::validation_field(
                "Broker address must use http:// or https://",
                "broker.address",
            ));
        }

        Url::parse(&self.action.compute_base_url).map_err(|e| {
            Error::validation_field(
                format!("Compute base URL '{}' is not a URL: {}", self.action.compute_base_url, e),
                "action.compute_base_url",
            )
        })?;

        if self.token.poll_interval() >= self.token.timeout() {
            return Err(Error::validation_field(
                "Token poll interval must be shorter than the token timeout",
                "token.poll_interval_ms",
            ));
        }

        EngineType::new(&self.broker.engine_type, &self.broker.role_segment)
            .map_err(|e| Error::validation_field(e.to_string(), "broker.engine_type"))?;

        Ok(())
    }

    /// Connection settings for the Vault broker.
    pub fn vault_config(&self) -> VaultConfig {
        VaultConfig {
            address: self.broker.address.clone(),
            token: self.broker.token.clone(),
            namespace: self.broker.namespace.clone(),
            request_timeout: self.broker.request_timeout(),
        }
    }

    /// Workflow settings derived from the broker, token and workflow sections.
    pub fn workflow_settings(&self) -> Result<WorkflowSettings> {
        let engine = EngineType::new(&self.broker.engine_type, &self.broker.role_segment)
            .map_err(|e| Error::validation_field(e.to_string(), "broker.engine_type"))?;
        let schedule = PollSchedule::new(self.token.timeout(), self.token.poll_interval())
            .map_err(|e| Error::validation_field(e.to_string(), "token"))?;

        Ok(WorkflowSettings {
            engine,
            role_name: self.workflow.role_name.clone(),
            schedule,
            on_existing_mount: self.workflow.on_existing_mount,
        })
    }
}

/// Vault connection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Vault server address
    #[validate(length(min = 1, message = "Broker address cannot be empty"))]
    pub address: String,

    /// Vault token. Usually supplied through `VAULT_TOKEN` rather than a file.
    pub token: Option<SecretString>,

    /// Vault Enterprise namespace
    pub namespace: Option<String>,

    /// Secrets engine type to mount per tenant
    #[validate(length(min = 1, message = "Engine type cannot be empty"))]
    pub engine_type: String,

    /// Path segment roles live under for this engine type
    #[validate(length(min = 1, message = "Role segment cannot be empty"))]
    pub role_segment: String,

    /// Per-request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub request_timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        let engine = EngineType::gcp();
        Self {
            address: VaultConfig::default().address,
            token: None,
            namespace: None,
            engine_type: engine.name().to_string(),
            role_segment: engine.role_segment().to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl BrokerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Bounds of the token wait
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct TokenConfig {
    /// Give up waiting for a token after this many seconds
    #[validate(range(min = 1, max = 3600, message = "Token timeout must be between 1 and 3600 seconds"))]
    pub timeout_secs: u64,

    /// Delay between token reads in milliseconds
    #[validate(range(min = 10, message = "Poll interval must be at least 10ms"))]
    pub poll_interval_ms: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { timeout_secs: 60, poll_interval_ms: 1000 }
    }
}

impl TokenConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Workflow behaviour
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Name of the role declared for every tenant
    #[validate(length(min = 1, max = 128, message = "Role name must be 1-128 characters"))]
    pub role_name: String,

    /// What to do when the tenant already has a mount
    pub on_existing_mount: MountConflictPolicy,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            role_name: DEFAULT_ROLE_NAME.to_string(),
            on_existing_mount: MountConflictPolicy::default(),
        }
    }
}

/// Downstream compute action
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct ActionConfig {
    /// Compute API root
    #[validate(length(min = 1, message = "Compute base URL cannot be empty"))]
    pub compute_base_url: String,

    /// Cloud project owning the instance; defaults to the tenant identifier
    pub project: Option<String>,

    /// Zone of the instance
    pub zone: Option<String>,

    /// Instance to act on
    pub instance: Option<String>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300, message = "Timeout must be between 1 and 300 seconds"))]
    pub request_timeout_secs: u64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            compute_base_url: DEFAULT_COMPUTE_BASE_URL.to_string(),
            project: None,
            zone: None,
            instance: None,
            request_timeout_secs: 30,
        }
    }
}

impl ActionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.broker.address, "http://127.0.0.1:8200");
        assert_eq!(config.broker.engine_type, "gcp");
        assert_eq!(config.token.timeout(), Duration::from_secs(60));
        assert_eq!(config.token.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.workflow.role_name, "my-token-roleset");
        assert_eq!(config.workflow.on_existing_mount, MountConflictPolicy::Reuse);
    }

    #[test]
    fn test_poll_interval_must_be_below_timeout() {
        let mut config = AppConfig::default();
        config.token.timeout_secs = 1;
        config.token.poll_interval_ms = 1000;

        match config.validate() {
            Err(Error::Validation { field, .. }) => {
                assert_eq!(field.as_deref(), Some("token.poll_interval_ms"))
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_broker_address_must_be_http() {
        let mut config = AppConfig::default();
        config.broker.address = "ftp://vault:8200".to_string();
        assert!(config.validate().is_err());

        config.broker.address = "vault:8200 with spaces".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_range_rules_apply() {
        let mut config = AppConfig::default();
        config.token.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_workflow_settings_derivation() {
        let mut config = AppConfig::default();
        config.workflow.role_name = "r1".to_string();
        config.workflow.on_existing_mount = MountConflictPolicy::Abort;
        config.token.poll_interval_ms = 250;

        let settings = config.workflow_settings().unwrap();
        assert_eq!(settings.role_name, "r1");
        assert_eq!(settings.on_existing_mount, MountConflictPolicy::Abort);
        assert_eq!(settings.schedule.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.engine, EngineType::gcp());
    }

    #[test]
    fn test_token_redacted_when_serialized() {
        let mut config = AppConfig::default();
        config.broker.token = Some(SecretString::new("hvs.supersecret"));

        let rendered = toml::to_string(&config).unwrap();
        assert!(!rendered.contains("hvs.supersecret"));
        assert!(!format!("{:?}", config).contains("hvs.supersecret"));
    }
}
