//! Engine configuration: root credentials written under a mount.

use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::errors::{AuthScope, ErrorKind};
use crate::secrets::{BrokerError, MountPath, SecretData, SecretsBroker};

/// Key the broker expects the credential blob under.
pub const CREDENTIALS_KEY: &str = "credentials";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineConfigError {
    #[error("No secrets engine mounted at '{path}'")]
    MountNotFound { path: String },

    #[error("Not authorized to configure the secrets engine: {message}")]
    Unauthorized { message: String },

    #[error("Broker unreachable while writing engine configuration: {message}")]
    Unreachable { message: String },

    /// The broker rejected the credential blob, or it could not be framed
    /// as a string value.
    #[error("Credential payload rejected: {reason}")]
    MalformedPayload { reason: String },

    #[error("Engine configuration rejected: {source}")]
    Rejected {
        #[source]
        source: BrokerError,
    },
}

impl EngineConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineConfigError::MountNotFound { .. } => ErrorKind::NotFound,
            EngineConfigError::Unauthorized { .. } => ErrorKind::Authorization(AuthScope::Broker),
            EngineConfigError::Unreachable { .. } => ErrorKind::Transport,
            EngineConfigError::MalformedPayload { .. } => ErrorKind::InvalidInput,
            EngineConfigError::Rejected { source } => source.kind(),
        }
    }
}

impl From<BrokerError> for EngineConfigError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::NoHandler { path } => EngineConfigError::MountNotFound { path },
            BrokerError::PermissionDenied { .. } => {
                EngineConfigError::Unauthorized { message: err.to_string() }
            }
            BrokerError::Transport { message } => EngineConfigError::Unreachable { message },
            BrokerError::BadRequest { errors } => {
                EngineConfigError::MalformedPayload { reason: errors.join("; ") }
            }
            other => EngineConfigError::Rejected { source: other },
        }
    }
}

/// Writes the engine's root credential configuration.
#[derive(Clone)]
pub struct EngineConfigWriter {
    broker: Arc<dyn SecretsBroker>,
}

impl EngineConfigWriter {
    pub fn new(broker: Arc<dyn SecretsBroker>) -> Self {
        Self { broker }
    }

    /// Writes `credentials` to `<mount>/config`, replacing any previous
    /// configuration. Safe to repeat with the same payload.
    ///
    /// The payload is opaque: it is only framed as a UTF-8 string under the
    /// `credentials` key. Validating its contents is the broker's job.
    #[instrument(skip_all, fields(tenant = %mount.tenant(), mount = %mount))]
    pub async fn write_engine_config(
        &self,
        mount: &MountPath,
        credentials: &[u8],
    ) -> Result<(), EngineConfigError> {
        let blob = std::str::from_utf8(credentials).map_err(|e| {
            EngineConfigError::MalformedPayload {
                reason: format!("credential payload is not valid UTF-8: {}", e),
            }
        })?;

        let mut data = SecretData::new();
        data.insert(CREDENTIALS_KEY.to_string(), Value::String(blob.to_string()));

        self.broker.write(&mount.config_path(), &data).await?;

        info!(bytes = credentials.len(), "Secrets engine configured");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::{EngineType, InMemoryBroker, TenantId};

    async fn mounted() -> (Arc<InMemoryBroker>, MountPath) {
        let broker = Arc::new(InMemoryBroker::new());
        let mount = MountPath::new(&EngineType::gcp(), &TenantId::new("t1").unwrap());
        broker.create_mount(mount.as_str(), "gcp").await.unwrap();
        (broker, mount)
    }

    #[tokio::test]
    async fn test_payload_framed_under_credentials_key() {
        let (broker, mount) = mounted().await;
        let writer = EngineConfigWriter::new(broker.clone());
        let payload = br#"{"type":"service_account","project_id":"csm-pro"}"#;

        writer.write_engine_config(&mount, payload).await.unwrap();

        let stored = broker.get("gcp/t1/config").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored.get(CREDENTIALS_KEY).and_then(|v| v.as_str()),
            Some(std::str::from_utf8(payload).unwrap())
        );
    }

    #[tokio::test]
    async fn test_write_is_idempotent() {
        let (broker, mount) = mounted().await;
        let writer = EngineConfigWriter::new(broker.clone());

        writer.write_engine_config(&mount, b"blob").await.unwrap();
        let first = broker.get("gcp/t1/config");
        writer.write_engine_config(&mount, b"blob").await.unwrap();
        let second = broker.get("gcp/t1/config");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_unmounted_tenant() {
        let broker = Arc::new(InMemoryBroker::new());
        let mount = MountPath::new(&EngineType::gcp(), &TenantId::new("ghost").unwrap());

        let err = EngineConfigWriter::new(broker)
            .write_engine_config(&mount, b"blob")
            .await
            .unwrap_err();
        assert_eq!(err, EngineConfigError::MountNotFound { path: "gcp/ghost/config".to_string() });
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_non_utf8_payload_rejected_locally() {
        let (broker, mount) = mounted().await;
        let err = EngineConfigWriter::new(broker.clone())
            .write_engine_config(&mount, &[0xff, 0xfe, 0x00])
            .await
            .unwrap_err();

        assert!(matches!(err, EngineConfigError::MalformedPayload { .. }));
        assert!(broker.writes().is_empty());
    }

    #[tokio::test]
    async fn test_broker_rejection_is_malformed_payload() {
        let (broker, mount) = mounted().await;
        broker.fail_writes(
            "gcp/t1/config",
            BrokerError::BadRequest { errors: vec!["invalid credentials JSON".to_string()] },
        );

        let err = EngineConfigWriter::new(broker)
            .write_engine_config(&mount, b"not json")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            EngineConfigError::MalformedPayload { reason: "invalid credentials JSON".to_string() }
        );
    }
}
