//! # Error Handling
//!
//! Shared error taxonomy for the credential workflow and the application-level
//! error type used by configuration loading and the CLI.
//!
//! Every component in the workflow returns its own `thiserror` enum. Each of
//! those enums can be classified into an [`ErrorKind`], which is what the
//! orchestrator reports when a run fails.

use std::fmt;

/// Custom result type for application-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Which side rejected a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScope {
    /// The secrets broker refused the broker access credential
    Broker,
    /// The downstream cloud API refused the materialized token
    Downstream,
}

impl fmt::Display for AuthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScope::Broker => write!(f, "broker"),
            AuthScope::Downstream => write!(f, "downstream"),
        }
    }
}

/// Classification of every failure the workflow can surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Peer could not be reached
    Transport,
    /// Credential rejected, by the broker or by the downstream API
    Authorization(AuthScope),
    /// Resource already exists (mount collision)
    Conflict,
    /// Token not yet materialized; only ever seen inside the poll loop
    NotReady,
    /// Bounded wait exhausted
    Timeout,
    /// Caller cancelled the wait
    Cancelled,
    /// Response did not have the expected shape
    MalformedResponse,
    /// Caller-supplied input rejected locally or by the peer
    InvalidInput,
    /// Addressed resource does not exist (e.g. no mount at the path)
    NotFound,
    /// Any other peer answer
    Unexpected,
}

impl ErrorKind {
    /// Whether the failure was a credential rejection, regardless of scope.
    pub fn is_authorization(&self) -> bool {
        matches!(self, ErrorKind::Authorization(_))
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "transport_error"),
            ErrorKind::Authorization(scope) => write!(f, "authorization_error({})", scope),
            ErrorKind::Conflict => write!(f, "conflict_error"),
            ErrorKind::NotReady => write!(f, "not_ready"),
            ErrorKind::Timeout => write!(f, "timeout_error"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::MalformedResponse => write!(f, "malformed_response_error"),
            ErrorKind::InvalidInput => write!(f, "invalid_input_error"),
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::Unexpected => write!(f, "unexpected_error"),
        }
    }
}

/// Application-level error type (configuration, material loading, I/O)
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    /// I/O errors with additional context
    #[error("I/O error: {context}")]
    Io {
        #[source]
        source: std::io::Error,
        context: String,
    },
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation { message: message.into(), field: None }
    }

    /// Create a validation error with field information
    pub fn validation_field<S: Into<String>, F: Into<String>>(message: S, field: F) -> Self {
        Self::Validation { message: message.into(), field: Some(field.into()) }
    }

    /// Create an I/O error with context
    pub fn io<S: Into<String>>(source: std::io::Error, context: S) -> Self {
        Self::Io { source, context: context.into() }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.keys().map(|k| k.to_string()).collect();
        fields.sort();

        match fields.first() {
            Some(field) => Self::validation_field(errors.to_string(), field.clone()),
            None => Self::validation(errors.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_display() {
        assert_eq!(ErrorKind::Conflict.to_string(), "conflict_error");
        assert_eq!(
            ErrorKind::Authorization(AuthScope::Downstream).to_string(),
            "authorization_error(downstream)"
        );
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout_error");
    }

    #[test]
    fn test_authorization_scopes_are_distinct() {
        let broker = ErrorKind::Authorization(AuthScope::Broker);
        let downstream = ErrorKind::Authorization(AuthScope::Downstream);
        assert_ne!(broker, downstream);
        assert!(broker.is_authorization());
        assert!(downstream.is_authorization());
        assert!(!ErrorKind::Transport.is_authorization());
    }

    #[test]
    fn test_error_constructors() {
        let err = Error::config("missing broker address");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: missing broker address");

        let err = Error::validation_field("must be positive", "token.timeout_secs");
        match err {
            Error::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("token.timeout_secs"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
