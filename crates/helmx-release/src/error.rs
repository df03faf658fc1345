//! Error types for helmx-release

use helmx_core::{CoreError, ExecError};
use thiserror::Error;

/// Result type for release operations
pub type Result<T> = std::result::Result<T, ReleaseError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReleaseError {
    #[error("no resources to be adopted")]
    NoResources,

    #[error("release '{name}' not found in namespace '{namespace}'")]
    ReleaseNotFound { name: String, namespace: String },

    #[error("release data too large ({size} bytes, max {max} bytes)")]
    ReleaseTooLarge { size: usize, max: usize },

    #[error("unknown storage backend \"{0}\": must be one of configmaps, secrets")]
    UnknownBackend(String),

    #[error("storage object {name} has no \"release\" entry")]
    MissingReleaseData { name: String },

    // ============ Hook Errors ============
    #[error("unexpected format of manifest: missing Source line:\n{manifest}")]
    MissingSource { manifest: String },

    #[error("unexpected hook: {hook}: must be one of {}", .known.join(", "))]
    UnknownHook { hook: String, known: Vec<&'static str> },

    #[error("unknown target hook \"{target}\": must be one of {}", .known.join(", "))]
    UnknownTarget {
        target: String,
        known: Vec<&'static str>,
    },

    #[error("hook {path} has no metadata.name")]
    MissingHookName { path: String },

    #[error("invalid hook weight \"{value}\" on {name}")]
    InvalidHookWeight { name: String, value: String },

    #[error("unknown hook delete policy \"{policy}\" on {name}")]
    UnknownDeletePolicy { name: String, policy: String },

    // ============ Codec Errors ============
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    // ============ Subprocess / IO Errors ============
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ReleaseError {
    fn from(e: serde_json::Error) -> Self {
        ReleaseError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for ReleaseError {
    fn from(e: serde_yaml::Error) -> Self {
        ReleaseError::Serialization(e.to_string())
    }
}
