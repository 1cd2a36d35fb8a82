//! Loading of static credential material from disk.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use zeroize::Zeroizing;

use crate::provisioning::RoleSpec;

#[derive(thiserror::Error, Debug)]
pub enum MaterialError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is empty")]
    Empty { path: PathBuf },

    #[error("{path} is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} must contain a JSON object")]
    NotAnObject { path: PathBuf },
}

/// Reads the engine's root credential file verbatim.
///
/// The contents are not parsed; the broker validates them when the engine
/// is configured.
pub fn load_credentials(path: impl AsRef<Path>) -> Result<Zeroizing<Vec<u8>>, MaterialError> {
    let path = path.as_ref();
    let bytes = Zeroizing::new(
        std::fs::read(path)
            .map_err(|source| MaterialError::Read { path: path.to_path_buf(), source })?,
    );
    if bytes.is_empty() {
        return Err(MaterialError::Empty { path: path.to_path_buf() });
    }

    debug!(path = %path.display(), bytes = bytes.len(), "Loaded credential material");
    Ok(bytes)
}

/// Reads a role definition document. It must be a JSON object.
pub fn load_role_spec(path: impl AsRef<Path>) -> Result<RoleSpec, MaterialError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|source| MaterialError::Read { path: path.to_path_buf(), source })?;
    let value: Value = serde_json::from_str(&raw)
        .map_err(|source| MaterialError::InvalidJson { path: path.to_path_buf(), source })?;

    let spec =
        RoleSpec::from_value(value).ok_or_else(|| MaterialError::NotAnObject { path: path.to_path_buf() })?;
    debug!(path = %path.display(), fields = spec.fields().len(), "Loaded role definition");
    Ok(spec)
}
