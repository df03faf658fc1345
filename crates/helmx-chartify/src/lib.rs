//! helm-x Chartify - normalize any manifest source into one temporary chart
//!
//! The pipeline runs these stages in order, each consuming the manifest files produced by the
//! previous one:
//! 1. stage the source (local copy, local archive or `helm fetch`)
//! 2. normalize it: render chart templates, build a kustomization or adopt raw manifests
//! 3. flatten ad-hoc and declared chart dependencies into plain files
//! 4. patch the result through a generated kustomize overlay (charts only)
//! 5. run injectors over every manifest file

pub mod dependency;
pub mod error;
pub mod inject;
pub mod kustomize;
pub mod options;
pub mod patch;
pub mod pipeline;
pub mod source;

pub use dependency::{AdhocDependency, RepoTable};
pub use error::{ChartifyError, Result};
pub use inject::Injector;
pub use kustomize::{KustomizeImage, KustomizeOpts};
pub use options::ChartifyOptions;
pub use patch::{JsonPatchSource, JsonPatchSpec, PatchSet};
pub use pipeline::{Chartify, Pipeline};
pub use source::SourceKind;
