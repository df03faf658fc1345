//! Core error types

use std::path::PathBuf;

use thiserror::Error;

use crate::exec::ExecError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("{count} entries found in {dir}, expected exactly one: {entries:?}")]
    UnexpectedEntries {
        dir: PathBuf,
        count: usize,
        entries: Vec<String>,
    },

    #[error("Failed to extract {archive}: {message}")]
    Archive { archive: PathBuf, message: String },

    #[error("Invalid Chart.yaml at {path}: {message}")]
    InvalidChart { path: PathBuf, message: String },

    #[error("Invalid requirements.yaml at {path}: {message}")]
    InvalidRequirements { path: PathBuf, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] semver::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
