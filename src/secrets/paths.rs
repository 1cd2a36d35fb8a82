//! Broker path construction.
//!
//! Every broker path used by the workflow is rooted at a per-tenant engine
//! mount: `<engine>/<tenant>`. Configuration lives at `<mount>/config`, roles
//! at `<mount>/<role segment>/<role>` and minted tokens at
//! `<mount>/<role segment>/<role>/token`.
//!
//! Path components are validated before they are joined so that a tenant or
//! role name can never escape its mount.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest accepted path component.
pub const MAX_COMPONENT_LEN: usize = 128;

/// A path component failed validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {component}: {reason}")]
pub struct InvalidComponent {
    pub component: String,
    pub reason: String,
}

impl InvalidComponent {
    fn new(component: &str, reason: impl Into<String>) -> Self {
        Self { component: component.to_string(), reason: reason.into() }
    }
}

/// Validates a single broker path component.
///
/// Rejects empty strings, strings longer than [`MAX_COMPONENT_LEN`], path
/// separators, traversal sequences, whitespace and URL delimiters.
pub fn validate_path_component(
    value: &str,
    component: &str,
) -> std::result::Result<(), InvalidComponent> {
    if value.is_empty() {
        return Err(InvalidComponent::new(component, "cannot be empty"));
    }

    if value.len() > MAX_COMPONENT_LEN {
        return Err(InvalidComponent::new(
            component,
            format!(
                "exceeds maximum length of {} characters (got {})",
                MAX_COMPONENT_LEN,
                value.len()
            ),
        ));
    }

    if value.contains('/') {
        return Err(InvalidComponent::new(component, "cannot contain '/'"));
    }

    if value.contains("..") {
        return Err(InvalidComponent::new(component, "cannot contain '..'"));
    }

    if let Some(c) = value.chars().find(|c| c.is_whitespace() || matches!(c, '?' | '#' | '%')) {
        return Err(InvalidComponent::new(component, format!("cannot contain {:?}", c)));
    }

    Ok(())
}

/// Opaque identifier of the tenant (cloud project) a mount is provisioned for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    pub fn new(value: impl Into<String>) -> std::result::Result<Self, InvalidComponent> {
        let value = value.into();
        validate_path_component(&value, "tenant identifier")?;
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = InvalidComponent;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(tenant: TenantId) -> Self {
        tenant.0
    }
}

/// Secrets-engine type tag, plus the path segment its roles live under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineType {
    name: String,
    role_segment: String,
}

impl EngineType {
    pub fn new(
        name: impl Into<String>,
        role_segment: impl Into<String>,
    ) -> std::result::Result<Self, InvalidComponent> {
        let name = name.into();
        let role_segment = role_segment.into();
        validate_path_component(&name, "engine type")?;
        validate_path_component(&role_segment, "role segment")?;
        Ok(Self { name, role_segment })
    }

    /// Google Cloud secrets engine: roles are "rolesets".
    pub fn gcp() -> Self {
        Self { name: "gcp".to_string(), role_segment: "roleset".to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role_segment(&self) -> &str {
        &self.role_segment
    }
}

impl Default for EngineType {
    fn default() -> Self {
        Self::gcp()
    }
}

impl fmt::Display for EngineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Location of a tenant's engine mount and of everything beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPath {
    engine: EngineType,
    tenant: TenantId,
    path: String,
}

impl MountPath {
    pub fn new(engine: &EngineType, tenant: &TenantId) -> Self {
        Self {
            engine: engine.clone(),
            tenant: tenant.clone(),
            path: format!("{}/{}", engine.name(), tenant.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.path
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn engine(&self) -> &EngineType {
        &self.engine
    }

    pub fn config_path(&self) -> String {
        format!("{}/config", self.path)
    }

    pub fn role_path(&self, role: &str) -> std::result::Result<String, InvalidComponent> {
        validate_path_component(role, "role name")?;
        Ok(format!("{}/{}/{}", self.path, self.engine.role_segment(), role))
    }

    pub fn token_path(&self, role: &str) -> std::result::Result<String, InvalidComponent> {
        Ok(format!("{}/token", self.role_path(role)?))
    }
}

impl fmt::Display for MountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
