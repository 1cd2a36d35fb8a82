//! Core broker trait and its error type.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::{AuthScope, ErrorKind};

/// Result type for raw broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Key/value payload read from or written to a broker path.
pub type SecretData = Map<String, Value>;

/// Raw failures reported by a secrets broker, before any component gives
/// them workflow meaning.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// The broker could not be reached.
    #[error("Broker unreachable: {message}")]
    Transport { message: String },

    /// The broker access credential was rejected.
    #[error("Permission denied by broker (status {status}): {}", .errors.join("; "))]
    PermissionDenied { status: u16, errors: Vec<String> },

    /// A mount already exists at the path.
    #[error("Path already in use: {path}")]
    PathInUse { path: String },

    /// Nothing is mounted at the path.
    #[error("No handler for path: {path}")]
    NoHandler { path: String },

    /// The broker rejected the request payload.
    #[error("Broker rejected request: {}", .errors.join("; "))]
    BadRequest { errors: Vec<String> },

    /// The broker answered with something that is not a broker response.
    #[error("Malformed broker response: {message}")]
    MalformedResponse { message: String },

    /// Any other broker answer.
    #[error("Broker error (status {status}): {}", .errors.join("; "))]
    Server { status: u16, errors: Vec<String> },

    /// The client could not be configured.
    #[error("Invalid broker client configuration: {message}")]
    InvalidConfig { message: String },
}

impl BrokerError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport { message: message.into() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse { message: message.into() }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig { message: message.into() }
    }

    /// Classify an HTTP error answer from the broker.
    ///
    /// Vault reports mount collisions as a 400 whose message contains
    /// "already in use", and unmounted paths as a 404.
    pub fn from_status(status: u16, errors: Vec<String>, path: &str) -> Self {
        match status {
            401 | 403 => Self::PermissionDenied { status, errors },
            404 => Self::NoHandler { path: path.to_string() },
            400 if errors.iter().any(|e| e.contains("already in use")) => {
                Self::PathInUse { path: path.to_string() }
            }
            400 => Self::BadRequest { errors },
            _ => Self::Server { status, errors },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::Transport { .. } => ErrorKind::Transport,
            BrokerError::PermissionDenied { .. } => ErrorKind::Authorization(AuthScope::Broker),
            BrokerError::PathInUse { .. } => ErrorKind::Conflict,
            BrokerError::NoHandler { .. } => ErrorKind::NotFound,
            BrokerError::BadRequest { .. } | BrokerError::InvalidConfig { .. } => {
                ErrorKind::InvalidInput
            }
            BrokerError::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            BrokerError::Server { .. } => ErrorKind::Unexpected,
        }
    }
}

/// The three broker operations the credential workflow depends on.
///
/// Paths are hierarchical strings rooted at an engine mount, without the API
/// version prefix (e.g. `gcp/t1/config`).
///
/// # Security
///
/// Implementations MUST NOT log the contents of `data` or of read results.
#[async_trait]
pub trait SecretsBroker: Send + Sync {
    /// Register a new secrets-engine mount of `engine_type` at `path`.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::PathInUse`] if something is already mounted there
    /// - [`BrokerError::PermissionDenied`] if the credential lacks admin scope
    async fn create_mount(&self, path: &str, engine_type: &str) -> Result<()>;

    /// Write `data` to `path`, replacing whatever was there.
    async fn write(&self, path: &str, data: &SecretData) -> Result<()>;

    /// Read `path`.
    ///
    /// Returns `Ok(None)` when the broker has no data at the path yet.
    async fn read(&self, path: &str) -> Result<Option<SecretData>>;
}
