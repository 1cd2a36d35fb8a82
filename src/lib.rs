//! # credflow
//!
//! Provisions ephemeral, scoped cloud credentials from HashiCorp Vault and
//! spends each one on exactly one privileged control-plane call.
//!
//! ## Architecture
//!
//! One run is a strictly linear workflow for a single tenant:
//!
//! ```text
//! mount engine → write config → declare role → poll for token → bearer call
//!      ↓               ↓               ↓               ↓
//!            SecretsBroker (Vault HTTP API)      Downstream cloud API
//! ```
//!
//! ## Core Components
//!
//! - **Secrets broker** ([`secrets`]): the `SecretsBroker` trait, the Vault
//!   backend and an in-memory backend for dry runs and tests
//! - **Provisioning** ([`provisioning`]): mount, engine configuration, role
//!   declaration and the bounded token poll
//! - **Action** ([`action`]): the single bearer-authenticated downstream call
//! - **Workflow** ([`workflow`]): the state machine sequencing all of the above
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use credflow::action::{ActionInvoker, ActionRequest, DEFAULT_COMPUTE_BASE_URL};
//! use credflow::config::AppConfig;
//! use credflow::material::{load_credentials, load_role_spec};
//! use credflow::secrets::{TenantId, VaultBroker};
//! use credflow::workflow::{Workflow, WorkflowInputs};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let broker = Arc::new(VaultBroker::connect(config.vault_config()).await?);
//!     let invoker = ActionInvoker::new(config.action.request_timeout())?;
//!
//!     let inputs = WorkflowInputs {
//!         tenant: TenantId::new("222ddx6")?,
//!         credentials: load_credentials("creds.json")?,
//!         role_spec: load_role_spec("roleset.json")?,
//!         action: ActionRequest::compute_instance_stop(
//!             DEFAULT_COMPUTE_BASE_URL, "222ddx6", "us-central1-a", "vm-1",
//!         )?,
//!     };
//!
//!     let report = Workflow::new(broker, invoker, config.workflow_settings()?)
//!         .run(inputs, &CancellationToken::new())
//!         .await?;
//!     println!("stopped with HTTP {}", report.action.status);
//!     Ok(())
//! }
//! ```

pub mod action;
pub mod cli;
pub mod config;
pub mod errors;
pub mod material;
pub mod observability;
pub mod provisioning;
pub mod secrets;
pub mod workflow;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Error, ErrorKind, Result};
pub use workflow::{RunReport, Workflow, WorkflowFailure, WorkflowState};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_available() {
        assert!(!VERSION.is_empty());
        assert_eq!(APP_NAME, "credflow");
    }
}
