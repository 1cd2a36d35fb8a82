//! Shared test infrastructure: wiremock stand-ins for Vault and the compute API.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use credflow::secrets::{SecretString, VaultBroker, VaultConfig};

pub const VAULT_TOKEN: &str = "hvs.test-root-token";
pub const MINTED_TOKEN: &str = "tok-abc";
pub const STOP_PATH: &str = "/projects/t1/zones/us-central1-a/instances/vm-1/stop";

/// Vault mock for tenant `t1`, role `r1`.
pub struct MockVault {
    pub server: MockServer,
}

impl MockVault {
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    pub fn broker(&self) -> VaultBroker {
        VaultBroker::new(VaultConfig {
            address: self.server.uri(),
            token: Some(SecretString::new(VAULT_TOKEN)),
            namespace: None,
            request_timeout: Duration::from_secs(5),
        })
        .expect("vault broker")
    }

    pub async fn accept_mount(&self) {
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1/sys/mounts/gcp/t1/?$"))
            .and(header("X-Vault-Token", VAULT_TOKEN))
            .and(body_partial_json(json!({"type": "gcp"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn reject_mount(&self, status: u16, error: &str) {
        Mock::given(method("POST"))
            .and(path_regex(r"^/v1/sys/mounts/gcp/t1/?$"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({"errors": [error]})))
            .mount(&self.server)
            .await;
    }

    pub async fn accept_config(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/gcp/t1/config"))
            .and(header("X-Vault-Token", VAULT_TOKEN))
            .and(body_partial_json(json!({"credentials": r#"{"type":"service_account"}"#})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn accept_role(&self) {
        Mock::given(method("POST"))
            .and(path("/v1/gcp/t1/roleset/r1"))
            .and(body_partial_json(json!({"secret_type": "access_token"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Answers 404 to the first `pending` token reads, then returns `data`.
    pub async fn token_after(&self, pending: u64, data: Value) {
        if pending > 0 {
            Mock::given(method("GET"))
                .and(path("/v1/gcp/t1/roleset/r1/token"))
                .respond_with(ResponseTemplate::new(404).set_body_json(json!({"errors": []})))
                .up_to_n_times(pending)
                .with_priority(1)
                .mount(&self.server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/v1/gcp/t1/roleset/r1/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "request_id": "4c8c1f1e-3b8e-4d5e-9f0a-6c2f2b1d9e77",
                "lease_duration": 0,
                "renewable": false,
                "data": data,
            })))
            .with_priority(2)
            .mount(&self.server)
            .await;
    }

    pub async fn provision_all(&self) {
        self.accept_mount().await;
        self.accept_config().await;
        self.accept_role().await;
    }

    /// Number of requests Vault saw for `path`.
    pub async fn hits(&self, path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == path)
            .count()
    }
}

pub fn token_data(token: &str) -> Value {
    json!({"token": token, "expires_at_seconds": 1893456000, "token_ttl": 3599})
}

pub fn credentials() -> Vec<u8> {
    br#"{"type":"service_account"}"#.to_vec()
}

pub fn role_spec() -> Value {
    json!({
        "project": "t1",
        "secret_type": "access_token",
        "token_scopes": ["https://www.googleapis.com/auth/cloud-platform"]
    })
}
