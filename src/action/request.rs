//! Downstream requests and responses.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use url::Url;

use super::InvocationError;

/// Compute Engine v1 API root.
pub const DEFAULT_COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";

/// One bearer-authenticated call against a cloud control-plane API.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub method: Method,
    pub url: Url,
    /// Short human-readable name of what the call acts on, for logs.
    pub target: String,
    pub body: Option<Value>,
}

impl ActionRequest {
    pub fn new(method: Method, url: &str) -> Result<Self, InvocationError> {
        let url = Url::parse(url).map_err(|e| InvocationError::InvalidRequest {
            reason: format!("invalid action URL '{}': {}", url, e),
        })?;
        let target = url.path().to_string();
        Ok(Self { method, url, target, body: None })
    }

    /// `POST {base}/projects/{project}/zones/{zone}/instances/{instance}/stop`
    pub fn compute_instance_stop(
        base_url: &str,
        project: &str,
        zone: &str,
        instance: &str,
    ) -> Result<Self, InvocationError> {
        for (value, name) in [(project, "project"), (zone, "zone"), (instance, "instance")] {
            if value.is_empty() || value.contains('/') {
                return Err(InvocationError::InvalidRequest {
                    reason: format!("{} must be a non-empty path segment", name),
                });
            }
        }

        let mut url = Url::parse(base_url).map_err(|e| InvocationError::InvalidRequest {
            reason: format!("invalid compute base URL '{}': {}", base_url, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| InvocationError::InvalidRequest {
                reason: format!("compute base URL '{}' cannot have a path", base_url),
            })?
            .pop_if_empty()
            .extend(["projects", project, "zones", zone, "instances", instance, "stop"]);

        Ok(Self {
            method: Method::POST,
            url,
            target: format!("{}/{}/{}", project, zone, instance),
            body: None,
        })
    }

    pub fn with_json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

impl fmt::Display for ActionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// What the downstream API answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    pub status: u16,
    pub body: String,
}

impl ActionResponse {
    /// Body parsed as JSON, if it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compute_instance_stop_url() {
        let request =
            ActionRequest::compute_instance_stop(DEFAULT_COMPUTE_BASE_URL, "csm-pro", "us-central1-a", "vm-1")
                .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.url.as_str(),
            "https://compute.googleapis.com/compute/v1/projects/csm-pro/zones/us-central1-a/instances/vm-1/stop"
        );
        assert_eq!(request.target, "csm-pro/us-central1-a/vm-1");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_compute_instance_stop_trailing_slash_base() {
        let request =
            ActionRequest::compute_instance_stop("http://127.0.0.1:9000/", "p", "z", "i").unwrap();
        assert_eq!(request.url.as_str(), "http://127.0.0.1:9000/projects/p/zones/z/instances/i/stop");
    }

    #[test]
    fn test_compute_instance_stop_rejects_bad_segments() {
        assert!(ActionRequest::compute_instance_stop(DEFAULT_COMPUTE_BASE_URL, "", "z", "i").is_err());
        assert!(ActionRequest::compute_instance_stop(DEFAULT_COMPUTE_BASE_URL, "p", "a/b", "i").is_err());
        assert!(ActionRequest::compute_instance_stop("not a url", "p", "z", "i").is_err());
    }

    #[test]
    fn test_generic_request_with_body() {
        let request = ActionRequest::new(Method::PUT, "https://api.example.com/v1/things/1")
            .unwrap()
            .with_json_body(json!({"state": "off"}));
        assert_eq!(request.target, "/v1/things/1");
        assert_eq!(request.body, Some(json!({"state": "off"})));
        assert_eq!(request.to_string(), "PUT https://api.example.com/v1/things/1");
    }

    #[test]
    fn test_response_json() {
        let response = ActionResponse { status: 200, body: r#"{"kind":"compute#operation"}"#.into() };
        assert_eq!(response.json(), Some(json!({"kind": "compute#operation"})));
        assert!(ActionResponse { status: 204, body: String::new() }.json().is_none());
    }
}
