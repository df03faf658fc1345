//! helm-x Core - shared building blocks for turning manifests into charts
//!
//! This crate provides the foundational pieces used by the other helm-x crates:
//! - `exec`: Running external binaries (`helm`, `kustomize`, `kubectl`) behind a trait
//! - `helm`: Helm binary wrapper aware of Helm 2 / Helm 3 argument conventions
//! - `staging`: Temporary working directories, archive extraction and file discovery
//! - `chart`: `Chart.yaml` and `requirements.yaml` models
//! - `object`: Typed Kubernetes object model with a bag for unknown fields

pub mod chart;
pub mod error;
pub mod exec;
pub mod helm;
pub mod object;
pub mod staging;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use chart::{ChartMetadata, Requirement, Requirements};
pub use error::{CoreError, Result};
pub use exec::{CommandOutput, CommandRunner, ExecError, Invocation, StdioMode, SystemRunner};
pub use helm::{Helm, HelmMajor, ValueArgs};
pub use object::{KubeObject, ObjectMeta};
pub use staging::{StagingDir, copy_dir_all, is_archive, search_files, single_entry, untar};
