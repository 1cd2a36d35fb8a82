//! # Structured Logging
//!
//! Subscriber setup and span macros built on the tracing ecosystem.
//!
//! Secrets never reach the log: broker tokens and materialized tokens are
//! wrapped in redacting types, and payloads are logged as sizes or key
//! counts only.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::{Error, Result};

/// Create the span that wraps one workflow run.
///
/// ```rust,ignore
/// let span = workflow_span!(run_id, tenant);
/// let span = workflow_span!(run_id, tenant, role = "r1");
/// ```
#[macro_export]
macro_rules! workflow_span {
    ($run_id:expr, $tenant:expr) => {
        tracing::info_span!(
            "workflow_run",
            run_id = %$run_id,
            tenant = %$tenant
        )
    };
    ($run_id:expr, $tenant:expr, $($field:tt)*) => {
        tracing::info_span!(
            "workflow_run",
            run_id = %$run_id,
            tenant = %$tenant,
            $($field)*
        )
    };
}

/// Create a span for a one-off broker operation outside a workflow run.
#[macro_export]
macro_rules! broker_span {
    ($operation:expr, $address:expr) => {
        tracing::info_span!(
            "broker_operation",
            operation = %$operation,
            address = %$address,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
}

/// Builds the filter: `RUST_LOG` if set, otherwise `default_level`.
pub fn env_filter(default_level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level)
            .map_err(|e| Error::config(format!("Invalid log level '{}': {}", default_level, e))),
    }
}

/// Installs the global subscriber, writing to stderr so stdout stays free
/// for command output.
///
/// Returns `Ok(false)` when a subscriber was already installed, e.g. by a
/// test harness.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = env_filter(&config.level)?;

    let installed = if config.json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    };

    Ok(installed)
}

/// Log configuration at startup
pub fn log_config_info(config: &crate::config::AppConfig) {
    tracing::info!(
        broker_address = %config.broker.address,
        broker_token = config.broker.token.is_some(),
        namespace = ?config.broker.namespace,
        engine_type = %config.broker.engine_type,
        role_name = %config.workflow.role_name,
        token_timeout_secs = config.token.timeout_secs,
        poll_interval_ms = config.token.poll_interval_ms,
        "credflow configuration"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_macros_compile() {
        let _span = workflow_span!(uuid::Uuid::new_v4(), "t1");
        let _span = workflow_span!(uuid::Uuid::new_v4(), "t1", role = "r1");
        let _span = broker_span!("health", "http://127.0.0.1:8200");
    }

    #[test]
    fn test_invalid_level_rejected() {
        // Only meaningful when RUST_LOG is not set in the test environment.
        if std::env::var("RUST_LOG").is_err() {
            assert!(env_filter("credflow=loudest").is_err());
        }
        assert!(env_filter("debug").is_ok());
    }

    #[test]
    fn test_init_logging_tolerates_existing_subscriber() {
        let config = LoggingConfig::default();
        let _ = init_logging(&config);
        assert!(init_logging(&config).is_ok());
    }

    #[test]
    fn test_log_config_info() {
        log_config_info(&crate::config::AppConfig::default());
    }
}
