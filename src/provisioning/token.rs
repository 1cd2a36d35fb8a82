//! Token materialization.
//!
//! The broker provisions the cloud-side grant behind a role asynchronously,
//! so a token read issued right after the role write may find nothing yet.
//! [`TokenMaterializer::await_token`] polls the token endpoint on a fixed
//! interval, bounded by a deadline, and treats "no data yet" as a reason to
//! retry. Every other failure ends the wait immediately.
//!
//! # Loop contract
//!
//! - The first read is issued immediately.
//! - Reads are spaced at least `poll_interval` apart. The wait between them
//!   is a cooperative `tokio` sleep.
//! - When the next read would land past the deadline, the loop sleeps until
//!   the deadline and fails with [`TokenError::TokenTimeout`]. It never reports a
//!   timeout before `timeout` has elapsed.
//! - A read still in flight at the deadline is abandoned.
//! - Cancelling the [`CancellationToken`] ends the wait with
//!   [`TokenError::Cancelled`].

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::errors::{AuthScope, ErrorKind};
use crate::secrets::{BrokerError, MountPath, SecretData, SecretsBroker, Token};

/// Field of the token-read response that carries the token.
pub const TOKEN_FIELD: &str = "token";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("Not authorized to read tokens: {message}")]
    Unauthorized { message: String },

    #[error("Broker unreachable while reading token: {message}")]
    Unreachable { message: String },

    #[error("Token response malformed: {reason}")]
    MalformedTokenResponse { reason: String },

    #[error("Token not materialized within {waited:?} ({attempts} attempts)")]
    TokenTimeout { attempts: u32, waited: Duration },

    #[error("Token wait cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("Invalid poll schedule: {reason}")]
    InvalidSchedule { reason: String },

    #[error("Token read rejected: {source}")]
    Rejected {
        #[source]
        source: BrokerError,
    },
}

impl TokenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TokenError::Unauthorized { .. } => ErrorKind::Authorization(AuthScope::Broker),
            TokenError::Unreachable { .. } => ErrorKind::Transport,
            TokenError::MalformedTokenResponse { .. } => ErrorKind::MalformedResponse,
            TokenError::TokenTimeout { .. } => ErrorKind::Timeout,
            TokenError::Cancelled { .. } => ErrorKind::Cancelled,
            TokenError::InvalidSchedule { .. } => ErrorKind::InvalidInput,
            TokenError::Rejected { source } => source.kind(),
        }
    }
}

impl From<BrokerError> for TokenError {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::PermissionDenied { .. } => TokenError::Unauthorized { message: err.to_string() },
            BrokerError::Transport { message } => TokenError::Unreachable { message },
            BrokerError::MalformedResponse { message } => {
                TokenError::MalformedTokenResponse { reason: message }
            }
            other => TokenError::Rejected { source: other },
        }
    }
}

/// Bounds of a token wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl PollSchedule {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Result<Self, TokenError> {
        if timeout.is_zero() {
            return Err(TokenError::InvalidSchedule { reason: "timeout must be positive".into() });
        }
        if poll_interval.is_zero() {
            return Err(TokenError::InvalidSchedule {
                reason: "poll interval must be positive".into(),
            });
        }
        Ok(Self { timeout, poll_interval })
    }
}

/// A token together with what it took to get it.
#[derive(Debug, Clone)]
pub struct MaterializedToken {
    pub token: Token,
    pub attempts: u32,
    pub waited: Duration,
}

/// Outcome of a single read attempt.
enum Poll {
    Ready(SecretData),
    NotReady,
}

/// Waits for the broker to mint a token for a role, then fetches it.
#[derive(Clone)]
pub struct TokenMaterializer {
    broker: Arc<dyn SecretsBroker>,
}

impl TokenMaterializer {
    pub fn new(broker: Arc<dyn SecretsBroker>) -> Self {
        Self { broker }
    }

    /// Polls for a token with no external cancellation.
    pub async fn await_token(
        &self,
        mount: &MountPath,
        role_name: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<MaterializedToken, TokenError> {
        let schedule = PollSchedule::new(timeout, poll_interval)?;
        self.await_token_with_cancel(mount, role_name, schedule, &CancellationToken::new()).await
    }

    /// Polls `<mount>/<role segment>/<role>/token` until a token appears, the
    /// schedule's timeout elapses, or `cancel` fires.
    #[instrument(skip_all, fields(tenant = %mount.tenant(), role = %role_name))]
    pub async fn await_token_with_cancel(
        &self,
        mount: &MountPath,
        role_name: &str,
        schedule: PollSchedule,
        cancel: &CancellationToken,
    ) -> Result<MaterializedToken, TokenError> {
        let path = mount
            .token_path(role_name)
            .map_err(|e| TokenError::Rejected { source: BrokerError::invalid_config(e.to_string()) })?;

        let started = Instant::now();
        let deadline = started + schedule.timeout;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TokenError::Cancelled { attempts }),
                read = timeout_at(deadline, self.poll_once(&path)) => read,
            };

            match read {
                Err(_elapsed) => {
                    warn!(attempts, "Token read still in flight at deadline");
                    return Err(TokenError::TokenTimeout { attempts, waited: started.elapsed() });
                }
                Ok(Err(e)) => {
                    warn!(attempts, error = %e, kind = %e.kind(), "Token read failed, not retrying");
                    return Err(e);
                }
                Ok(Ok(Poll::Ready(data))) => {
                    let token = extract_token(&data)?;
                    let waited = started.elapsed();
                    info!(attempts, waited_ms = waited.as_millis() as u64, "Token materialized");
                    return Ok(MaterializedToken { token, attempts, waited });
                }
                Ok(Ok(Poll::NotReady)) => {
                    debug!(attempts, kind = %ErrorKind::NotReady, "Token not ready yet");
                }
            }

            let next_attempt = Instant::now() + schedule.poll_interval;
            if next_attempt > deadline {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(TokenError::Cancelled { attempts }),
                    _ = sleep_until(deadline) => {}
                }
                warn!(attempts, timeout_ms = schedule.timeout.as_millis() as u64, "Token wait timed out");
                return Err(TokenError::TokenTimeout { attempts, waited: started.elapsed() });
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(TokenError::Cancelled { attempts }),
                _ = sleep_until(next_attempt) => {}
            }
        }
    }

    async fn poll_once(&self, path: &str) -> Result<Poll, TokenError> {
        match self.broker.read(path).await {
            Ok(Some(data)) => Ok(Poll::Ready(data)),
            Ok(None) => Ok(Poll::NotReady),
            Err(e) => Err(e.into()),
        }
    }
}

/// Pulls the token out of a token-read response.
fn extract_token(data: &SecretData) -> Result<Token, TokenError> {
    match data.get(TOKEN_FIELD) {
        Some(Value::String(value)) if !value.is_empty() => Ok(Token::new(value.as_str())),
        Some(Value::String(_)) => {
            Err(TokenError::MalformedTokenResponse { reason: "token field is empty".into() })
        }
        Some(other) => Err(TokenError::MalformedTokenResponse {
            reason: format!("token field is not a string (found {})", json_type(other)),
        }),
        None => {
            let mut keys: Vec<&str> = data.keys().map(String::as_str).collect();
            keys.sort_unstable();
            Err(TokenError::MalformedTokenResponse {
                reason: format!("token field missing (keys present: {:?})", keys),
            })
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
