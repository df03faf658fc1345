//! Error types for helmx-chartify

use std::path::PathBuf;

use helmx_core::{CoreError, ExecError};
use thiserror::Error;

/// Result type for chartify operations
pub type Result<T> = std::result::Result<T, ChartifyError>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChartifyError {
    // ============ Configuration Errors ============
    /// Inline values cannot be expressed as kustomize edits
    #[error("--set is not yet supported for kustomize-based apps! Use -f/--values flag instead.")]
    SetWithKustomization,

    #[error("--version is required when applying manifests")]
    MissingVersion,

    #[error("invalid dependency \"{spec}\": {reason}\nHint: dependencies take the form ALIAS=REPO/CHART:VERSION")]
    InvalidDependency { spec: String, reason: String },

    #[error("invalid JSON patch spec in {}: {reason}", file.display())]
    InvalidJsonPatch { file: PathBuf, reason: String },

    #[error("inject-flags must be in the form of key1=value1[,key2=value2,...]: {flag}")]
    InvalidInjectorFlag { flag: String },

    #[error("empty injector")]
    EmptyInjector,

    // ============ Resolution Errors ============
    #[error("no helm repo list entry found for repository \"{repo}\"\nHint: Run `helm repo add {repo} <url>` first")]
    RepositoryNotFound { repo: String },

    #[error("unexpected format of `helm repo list` at line {line}: {content:?}")]
    RepoListFormat { line: usize, content: String },

    #[error("invalid kustomize options in {}: {message}", file.display())]
    InvalidKustomizeOpts { file: PathBuf, message: String },

    // ============ Subprocess / IO Errors ============
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ChartifyError {
    /// Whether the error stems from the options alone, before anything ran
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::SetWithKustomization
                | Self::MissingVersion
                | Self::InvalidDependency { .. }
                | Self::InvalidJsonPatch { .. }
                | Self::InvalidInjectorFlag { .. }
                | Self::EmptyInjector
                | Self::Core(CoreError::InvalidVersion(_))
        )
    }
}
