//! Secrets broker access.
//!
//! The workflow talks to its broker exclusively through the [`SecretsBroker`]
//! trait, which exposes the three operations it needs:
//! - **create_mount**: register a secrets-engine instance at a path
//! - **write**: replace the key/value data at a path
//! - **read**: fetch the data at a path, or nothing if none is there yet
//!
//! # Backends
//!
//! - **HashiCorp Vault** ([`VaultBroker`]): the production backend
//! - **In-memory** ([`InMemoryBroker`]): emulates Vault path semantics for
//!   dry runs and tests
//!
//! # Security Considerations
//!
//! - Broker credentials and minted tokens are wrapped in [`SecretString`] and
//!   [`Token`], which redact themselves in logs and serialized output
//! - Broker payloads are never logged, only their paths and key counts

pub mod broker;
pub mod memory;
pub mod paths;
pub mod types;
pub mod vault;

pub use broker::{BrokerError, SecretData, SecretsBroker};
pub use memory::InMemoryBroker;
pub use paths::{validate_path_component, EngineType, InvalidComponent, MountPath, TenantId};
pub use types::{SecretString, Token};
pub use vault::{VaultBroker, VaultConfig};
