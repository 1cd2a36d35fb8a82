//! Secrets-engine administration: per-tenant mounts.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::errors::{AuthScope, ErrorKind};
use crate::secrets::{BrokerError, EngineType, MountPath, SecretsBroker, TenantId};

/// Mounting a tenant's secrets engine failed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MountError {
    /// A mount already exists for this tenant. Recoverable: the caller may
    /// reuse it.
    #[error("Secrets engine already mounted at '{path}'")]
    AlreadyMounted { path: String },

    #[error("Not authorized to mount secrets engines: {message}")]
    Unauthorized { message: String },

    #[error("Broker unreachable while mounting: {message}")]
    Unreachable { message: String },

    #[error("Mount rejected: {source}")]
    Rejected {
        #[source]
        source: BrokerError,
    },
}

impl MountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MountError::AlreadyMounted { .. } => ErrorKind::Conflict,
            MountError::Unauthorized { .. } => ErrorKind::Authorization(AuthScope::Broker),
            MountError::Unreachable { .. } => ErrorKind::Transport,
            MountError::Rejected { source } => source.kind(),
        }
    }
}

impl From<BrokerError> for MountError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::PathInUse { path } => MountError::AlreadyMounted { path },
            BrokerError::PermissionDenied { .. } => {
                MountError::Unauthorized { message: err.to_string() }
            }
            BrokerError::Transport { message } => MountError::Unreachable { message },
            other => MountError::Rejected { source: other },
        }
    }
}

/// Registers per-tenant secrets-engine mounts with the broker.
#[derive(Clone)]
pub struct EngineAdmin {
    broker: Arc<dyn SecretsBroker>,
}

impl EngineAdmin {
    pub fn new(broker: Arc<dyn SecretsBroker>) -> Self {
        Self { broker }
    }

    /// Mounts an engine of type `engine` for `tenant` at `<engine>/<tenant>`.
    ///
    /// Not idempotent: a second call for the same tenant fails with
    /// [`MountError::AlreadyMounted`].
    #[instrument(skip_all, fields(tenant = %tenant, engine = %engine))]
    pub async fn mount(
        &self,
        tenant: &TenantId,
        engine: &EngineType,
    ) -> Result<MountPath, MountError> {
        let mount = MountPath::new(engine, tenant);
        self.broker.create_mount(mount.as_str(), engine.name()).await?;

        info!(mount = %mount, "Secrets engine mounted for tenant");
        Ok(mount)
    }
}
