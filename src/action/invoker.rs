use reqwest::Client;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::{ActionRequest, ActionResponse, InvocationError};
use crate::secrets::Token;

/// Default downstream request timeout.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Issues exactly one bearer-authenticated request per call. Never retries.
#[derive(Debug, Clone)]
pub struct ActionInvoker {
    client: Client,
}

impl ActionInvoker {
    pub fn new(timeout: Duration) -> Result<Self, InvocationError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            InvocationError::InvalidRequest { reason: format!("failed to build HTTP client: {}", e) }
        })?;
        Ok(Self { client })
    }

    #[instrument(skip_all, fields(method = %request.method, target = %request.target))]
    pub async fn invoke(
        &self,
        token: &Token,
        request: &ActionRequest,
    ) -> Result<ActionResponse, InvocationError> {
        if token.is_empty() {
            return Err(InvocationError::EmptyToken);
        }

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .bearer_auth(token.expose_secret());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| InvocationError::Unreachable {
            message: e.without_url().to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| InvocationError::Unreachable {
            message: format!("failed to read response body: {}", e.without_url()),
        })?;

        if status.is_success() {
            info!(status = status.as_u16(), "Downstream action succeeded");
            return Ok(ActionResponse { status: status.as_u16(), body });
        }

        let err = InvocationError::from_status(status.as_u16(), body);
        warn!(status = status.as_u16(), kind = %err.kind(), "Downstream action failed");
        Err(err)
    }
}
