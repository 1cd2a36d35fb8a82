//! # Observability
//!
//! Structured logging for credflow. Every component logs through `tracing`
//! with structured fields; this module owns subscriber installation and the
//! span macros shared across the crate.

pub mod logging;

pub use logging::{env_filter, init_logging, log_config_info};
