//! Broker-side provisioning for a tenant.
//!
//! Each step of the credential workflow that touches the broker has its own
//! component here, and each reports failures through its own error type:
//!
//! - [`EngineAdmin`] mounts a secrets engine for a tenant
//! - [`EngineConfigWriter`] stores the root credentials the engine mints from
//! - [`RoleWriter`] declares the role that bounds minted tokens
//! - [`TokenMaterializer`] waits for the broker to mint a token and fetches it
//!
//! All components share one [`SecretsBroker`](crate::secrets::SecretsBroker)
//! handle and are cheap to clone.

pub mod engine;
pub mod engine_config;
pub mod role;
pub mod token;

pub use engine::{EngineAdmin, MountError};
pub use engine_config::{EngineConfigError, EngineConfigWriter, CREDENTIALS_KEY};
pub use role::{RoleError, RoleSpec, RoleWriter, DEFAULT_ROLE_NAME};
pub use token::{MaterializedToken, PollSchedule, TokenError, TokenMaterializer, TOKEN_FIELD};
