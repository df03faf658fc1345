//! helm-x Release - Helm 2 release records
//!
//! - `proto`: the `hapi.release.Release` protobuf messages
//! - `codec`: `base64(gzip(protobuf))` encoding of a record
//! - `storage`: ConfigMap/Secret storage objects and a `kubectl`-backed store
//! - `hooks`: splitting rendered manifests into resources and hooks
//! - `adopt`: adopting live resources into a new release record
//! - `install`: appending release storage objects to `helm template` output

pub mod adopt;
pub mod codec;
pub mod error;
pub mod hooks;
pub mod install;
pub mod proto;
pub mod storage;

pub use adopt::{ADOPTED_CHART, AdoptOptions, SERVICE_ACCOUNT_NAMESPACE_FILE, adopt, resolve_namespace};
pub use codec::{decode_release, encode_release};
pub use error::{ReleaseError, Result};
pub use hooks::{event_name, extract_hook_manifests, split_manifest_and_hooks};
pub use install::{InstallManifestOptions, install_release, template_to_install};
pub use proto::{Hook, HookDeletePolicy, HookEvent, Release, StatusCode};
pub use storage::{MAX_RELEASE_SIZE, ReleaseStore, ReleaseStoreConfig, StorageBackend, StorageObject};
