//! Authorized downstream action.
//!
//! The materialized token is consumed here, once, as the bearer credential
//! of a single HTTP request against a cloud control-plane API. A rejection
//! from the downstream API is reported as
//! [`ErrorKind::Authorization`] with [`AuthScope::Downstream`], so it can
//! never be confused with the broker refusing the workflow's own credential.

pub mod invoker;
pub mod request;

pub use invoker::{ActionInvoker, DEFAULT_ACTION_TIMEOUT};
pub use request::{ActionRequest, ActionResponse, DEFAULT_COMPUTE_BASE_URL};

use crate::errors::{AuthScope, ErrorKind};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationError {
    #[error("Refusing to invoke action with an empty token")]
    EmptyToken,

    #[error("Invalid action request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Downstream API unreachable: {message}")]
    Unreachable { message: String },

    #[error("Downstream API refused the token (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("Downstream API answered HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

impl InvocationError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => InvocationError::Unauthorized { status, body },
            _ => InvocationError::UnexpectedStatus { status, body },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            InvocationError::EmptyToken | InvocationError::InvalidRequest { .. } => {
                ErrorKind::InvalidInput
            }
            InvocationError::Unreachable { .. } => ErrorKind::Transport,
            InvocationError::Unauthorized { .. } => ErrorKind::Authorization(AuthScope::Downstream),
            InvocationError::UnexpectedStatus { .. } => ErrorKind::Unexpected,
        }
    }

    /// Status code the downstream API answered with, if it answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            InvocationError::Unauthorized { status, .. }
            | InvocationError::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}
