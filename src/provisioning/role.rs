//! Role definitions: the permission boundary of minted tokens.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::errors::{AuthScope, ErrorKind};
use crate::secrets::{BrokerError, MountPath, SecretData, SecretsBroker};

/// Role name used when none is configured.
pub const DEFAULT_ROLE_NAME: &str = "my-token-roleset";

/// Broker-defined policy document for a role.
///
/// Schema-agnostic: any JSON object is accepted and passed through as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSpec(SecretData);

impl RoleSpec {
    pub fn new(fields: SecretData) -> Self {
        Self(fields)
    }

    /// Returns `None` unless `value` is a JSON object.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    pub fn fields(&self) -> &SecretData {
        &self.0
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoleError {
    #[error("No secrets engine mounted at '{path}'")]
    MountNotFound { path: String },

    #[error("Not authorized to write roles: {message}")]
    Unauthorized { message: String },

    #[error("Broker unreachable while writing role: {message}")]
    Unreachable { message: String },

    #[error("Role specification rejected: {reason}")]
    InvalidSpec { reason: String },

    #[error("Role write rejected: {source}")]
    Rejected {
        #[source]
        source: BrokerError,
    },
}

impl RoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RoleError::MountNotFound { .. } => ErrorKind::NotFound,
            RoleError::Unauthorized { .. } => ErrorKind::Authorization(AuthScope::Broker),
            RoleError::Unreachable { .. } => ErrorKind::Transport,
            RoleError::InvalidSpec { .. } => ErrorKind::InvalidInput,
            RoleError::Rejected { source } => source.kind(),
        }
    }
}

impl From<BrokerError> for RoleError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NoHandler { path } => RoleError::MountNotFound { path },
            BrokerError::PermissionDenied { .. } => RoleError::Unauthorized { message: err.to_string() },
            BrokerError::Transport { message } => RoleError::Unreachable { message },
            BrokerError::BadRequest { errors } => RoleError::InvalidSpec { reason: errors.join("; ") },
            other => RoleError::Rejected { source: other },
        }
    }
}

/// Declares named roles under a mounted engine.
#[derive(Clone)]
pub struct RoleWriter {
    broker: Arc<dyn SecretsBroker>,
}

impl RoleWriter {
    pub fn new(broker: Arc<dyn SecretsBroker>) -> Self {
        Self { broker }
    }

    /// Creates or replaces role `role_name` under `mount`.
    ///
    /// Writing the same name twice overwrites; it is not an error.
    #[instrument(skip_all, fields(tenant = %mount.tenant(), role = %role_name))]
    pub async fn write_role(
        &self,
        mount: &MountPath,
        role_name: &str,
        spec: &RoleSpec,
    ) -> Result<(), RoleError> {
        let path =
            mount.role_path(role_name).map_err(|e| RoleError::InvalidSpec { reason: e.to_string() })?;

        self.broker.write(&path, spec.fields()).await?;

        info!(path = %path, fields = spec.fields().len(), "Role declared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{EngineType, InMemoryBroker, TenantId};
    use serde_json::json;

    fn roleset() -> RoleSpec {
        RoleSpec::from_value(json!({
            "project": "csm-pro",
            "secret_type": "access_token",
            "token_scopes": ["https://www.googleapis.com/auth/cloud-platform"],
            "bindings": "resource \"//cloudresourcemanager.googleapis.com/projects/csm-pro\" { roles = [\"roles/compute.instanceAdmin.v1\"] }"
        }))
        .unwrap()
    }

    async fn mounted() -> (Arc<InMemoryBroker>, MountPath) {
        let broker = Arc::new(InMemoryBroker::new());
        let mount = MountPath::new(&EngineType::gcp(), &TenantId::new("t1").unwrap());
        broker.create_mount(mount.as_str(), "gcp").await.unwrap();
        (broker, mount)
    }

    #[test]
    fn test_role_spec_requires_object() {
        assert!(RoleSpec::from_value(json!(["a", "b"])).is_none());
        assert!(RoleSpec::from_value(json!("roleset")).is_none());
        assert!(RoleSpec::from_value(json!({})).is_some());
    }

    #[tokio::test]
    async fn test_write_role_passes_spec_through() {
        let (broker, mount) = mounted().await;
        RoleWriter::new(broker.clone()).write_role(&mount, "r1", &roleset()).await.unwrap();

        let stored = broker.get("gcp/t1/roleset/r1").unwrap();
        assert_eq!(&stored, roleset().fields());
    }

    #[tokio::test]
    async fn test_rewrite_overwrites() {
        let (broker, mount) = mounted().await;
        let writer = RoleWriter::new(broker.clone());
        writer.write_role(&mount, "r1", &roleset()).await.unwrap();

        let replacement = RoleSpec::from_value(json!({"secret_type": "service_account_key"})).unwrap();
        writer.write_role(&mount, "r1", &replacement).await.unwrap();

        assert_eq!(&broker.get("gcp/t1/roleset/r1").unwrap(), replacement.fields());
    }

    #[tokio::test]
    async fn test_invalid_role_name() {
        let (broker, mount) = mounted().await;
        let err = RoleWriter::new(broker).write_role(&mount, "a/b", &roleset()).await.unwrap_err();
        assert!(matches!(err, RoleError::InvalidSpec { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_unmounted_tenant() {
        let broker = Arc::new(InMemoryBroker::new());
        let mount = MountPath::new(&EngineType::gcp(), &TenantId::new("t2").unwrap());
        let err = RoleWriter::new(broker).write_role(&mount, "r1", &roleset()).await.unwrap_err();
        assert!(matches!(err, RoleError::MountNotFound { .. }));
    }
}
