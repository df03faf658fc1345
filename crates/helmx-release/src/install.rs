//! Turning `helm template` output into an installable manifest
//!
//! The rendered documents are split into resources and hooks, wrapped in a version-1 release
//! record and the record's storage objects are appended, so that `kubectl apply` of the result
//! leaves behind what `helm install` would have.

use chrono::Utc;
use tracing::debug;

use crate::adopt::timestamp;
use crate::error::Result;
use crate::hooks::split_manifest_and_hooks;
use crate::proto::{Chart, Info, Metadata, Release, Status, StatusCode};
use crate::storage::{StorageBackend, StorageObject};

#[derive(Debug, Clone)]
pub struct InstallManifestOptions {
    pub release: String,
    /// Chart reference as given on the command line
    pub chart: String,
    pub chart_version: String,
    pub namespace: String,
    pub tiller_namespace: String,
    pub include_configmap: bool,
    pub include_secret: bool,
}

impl Default for InstallManifestOptions {
    fn default() -> Self {
        Self {
            release: String::new(),
            chart: String::new(),
            chart_version: String::new(),
            namespace: "default".to_string(),
            tiller_namespace: "kube-system".to_string(),
            include_configmap: false,
            include_secret: false,
        }
    }
}

/// Chart name of a reference: `stable/mysql` -> `mysql`, `./charts/web/` -> `web`
pub fn chart_name(reference: &str) -> &str {
    reference
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(reference)
}

/// The release record `helm install` would store for `rendered`
pub fn install_release(rendered: &str, options: &InstallManifestOptions) -> Result<Release> {
    let (manifest, hooks) = split_manifest_and_hooks(rendered)?;
    let now = timestamp(Utc::now());

    Ok(Release {
        name: options.release.clone(),
        namespace: options.namespace.clone(),
        version: 1,
        manifest,
        hooks,
        info: Some(Info {
            status: Some(Status {
                code: StatusCode::Deployed as i32,
                notes: String::new(),
            }),
            first_deployed: Some(now),
            last_deployed: Some(now),
            deleted: None,
            description: "Install complete".to_string(),
        }),
        chart: Some(Chart {
            metadata: Some(Metadata {
                name: chart_name(&options.chart).to_string(),
                version: options.chart_version.clone(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Resources of `rendered` followed by the selected release storage objects
///
/// With neither storage object selected the input is returned as is.
pub fn template_to_install(rendered: &str, options: &InstallManifestOptions) -> Result<String> {
    let backends: Vec<StorageBackend> = [
        (options.include_configmap, StorageBackend::ConfigMaps),
        (options.include_secret, StorageBackend::Secrets),
    ]
    .into_iter()
    .filter_map(|(enabled, backend)| enabled.then_some(backend))
    .collect();

    if backends.is_empty() {
        return Ok(rendered.to_string());
    }

    let release = install_release(rendered, options)?;
    let mut out = release.manifest.clone();
    for backend in backends {
        let object = StorageObject::new(backend, &release, &options.tiller_namespace)?;
        debug!(object = object.name(), %backend, "appending release storage object");
        out.push_str("\n---\n");
        out.push_str(&object.to_yaml()?);
    }
    Ok(out)
}
