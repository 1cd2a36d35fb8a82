//! # Configuration Management
//!
//! Configuration is resolved from four layers, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. an optional TOML file
//! 3. environment variables (`VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE`
//!    and the `CREDFLOW_*` family)
//! 4. command-line flags, applied by the CLI on top of the result
//!
//! The resolved [`AppConfig`] is validated once and then passed explicitly to
//! every component that needs it.

pub mod settings;

pub use settings::{
    ActionConfig, AppConfig, BrokerConfig, LoggingConfig, TokenConfig, WorkflowConfig,
};

use std::path::Path;
use std::str::FromStr;

use crate::errors::{Error, Result};
use crate::secrets::SecretString;
use crate::workflow::MountConflictPolicy;

/// Environment variables read by [`AppConfig::apply_env`].
pub mod env {
    pub const VAULT_ADDR: &str = "VAULT_ADDR";
    pub const VAULT_TOKEN: &str = "VAULT_TOKEN";
    pub const VAULT_NAMESPACE: &str = "VAULT_NAMESPACE";
    pub const ENGINE_TYPE: &str = "CREDFLOW_ENGINE_TYPE";
    pub const ROLE_SEGMENT: &str = "CREDFLOW_ROLE_SEGMENT";
    pub const BROKER_TIMEOUT_SECS: &str = "CREDFLOW_BROKER_TIMEOUT_SECS";
    pub const TOKEN_TIMEOUT_SECS: &str = "CREDFLOW_TOKEN_TIMEOUT_SECS";
    pub const POLL_INTERVAL_MS: &str = "CREDFLOW_POLL_INTERVAL_MS";
    pub const ROLE_NAME: &str = "CREDFLOW_ROLE_NAME";
    pub const ON_EXISTING_MOUNT: &str = "CREDFLOW_ON_EXISTING_MOUNT";
    pub const COMPUTE_BASE_URL: &str = "CREDFLOW_COMPUTE_BASE_URL";
    pub const PROJECT: &str = "CREDFLOW_PROJECT";
    pub const ZONE: &str = "CREDFLOW_ZONE";
    pub const INSTANCE: &str = "CREDFLOW_INSTANCE";
    pub const ACTION_TIMEOUT_SECS: &str = "CREDFLOW_ACTION_TIMEOUT_SECS";
    pub const LOG_LEVEL: &str = "CREDFLOW_LOG_LEVEL";
    pub const LOG_JSON: &str = "CREDFLOW_LOG_JSON";
}

impl FromStr for MountConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "reuse" => Ok(MountConflictPolicy::Reuse),
            "abort" => Ok(MountConflictPolicy::Abort),
            other => Err(Error::config(format!(
                "Invalid mount conflict policy '{}': expected 'reuse' or 'abort'",
                other
            ))),
        }
    }
}

impl AppConfig {
    /// Reads a TOML configuration file. Missing sections and keys keep their
    /// defaults; unknown keys are rejected.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::io(e, format!("Failed to read config file {}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| Error::config(format!("Invalid config file {}: {}", path.display(), e)))
    }

    /// Defaults, then `path` if given, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Overrides fields from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overrides fields from `lookup`. Empty values count as unset.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(env::VAULT_ADDR) {
            self.broker.address = v;
        }
        if let Some(v) = get(env::VAULT_TOKEN) {
            self.broker.token = Some(SecretString::new(v));
        }
        if let Some(v) = get(env::VAULT_NAMESPACE) {
            self.broker.namespace = Some(v);
        }
        if let Some(v) = get(env::ENGINE_TYPE) {
            self.broker.engine_type = v;
        }
        if let Some(v) = get(env::ROLE_SEGMENT) {
            self.broker.role_segment = v;
        }
        if let Some(v) = get(env::BROKER_TIMEOUT_SECS) {
            self.broker.request_timeout_secs = parse_var(env::BROKER_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(env::TOKEN_TIMEOUT_SECS) {
            self.token.timeout_secs = parse_var(env::TOKEN_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(env::POLL_INTERVAL_MS) {
            self.token.poll_interval_ms = parse_var(env::POLL_INTERVAL_MS, &v)?;
        }
        if let Some(v) = get(env::ROLE_NAME) {
            self.workflow.role_name = v;
        }
        if let Some(v) = get(env::ON_EXISTING_MOUNT) {
            self.workflow.on_existing_mount = v.parse()?;
        }
        if let Some(v) = get(env::COMPUTE_BASE_URL) {
            self.action.compute_base_url = v;
        }
        if let Some(v) = get(env::PROJECT) {
            self.action.project = Some(v);
        }
        if let Some(v) = get(env::ZONE) {
            self.action.zone = Some(v);
        }
        if let Some(v) = get(env::INSTANCE) {
            self.action.instance = Some(v);
        }
        if let Some(v) = get(env::ACTION_TIMEOUT_SECS) {
            self.action.request_timeout_secs = parse_var(env::ACTION_TIMEOUT_SECS, &v)?;
        }
        if let Some(v) = get(env::LOG_LEVEL) {
            self.logging.level = v;
        }
        if let Some(v) = get(env::LOG_JSON) {
            self.logging.json = matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes");
        }

        Ok(())
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| Error::config(format!("Invalid {} '{}': {}", key, value, e)))
}
