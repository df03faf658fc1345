//! Adoption of live cluster resources into a Helm release
//!
//! The objects are read with one `kubectl get`, stripped of server-assigned state and written
//! as the manifest of a new `DEPLOYED` release record. Nothing is re-applied to the cluster.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use helmx_core::{CommandRunner, Invocation, KubeObject};
use prost_types::Timestamp;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ReleaseError, Result};
use crate::proto::{Chart, Info, Metadata, Release, Status, StatusCode};
use crate::storage::{ReleaseStore, ReleaseStoreConfig};

/// Chart name recorded for adopted releases
pub const ADOPTED_CHART: &str = "helm-x-dummy-chart";

/// In-cluster service account namespace file
pub const SERVICE_ACCOUNT_NAMESPACE_FILE: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

#[derive(Debug, Clone)]
pub struct AdoptOptions {
    /// Namespace the adopted resources live in
    pub namespace: String,
    /// Pass `--export` to `kubectl get`; removed in kubectl 1.18
    pub export: bool,
    pub store: ReleaseStoreConfig,
}

impl Default for AdoptOptions {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            export: true,
            store: ReleaseStoreConfig::default(),
        }
    }
}

/// `--namespace` if given, else the service account namespace file, else `default`
pub fn resolve_namespace(flag: Option<&str>, service_account_file: &Path) -> String {
    if let Some(namespace) = flag.filter(|ns| !ns.is_empty()) {
        return namespace.to_string();
    }
    match fs::read_to_string(service_account_file) {
        Ok(content) if !content.trim().is_empty() => content.trim().to_string(),
        _ => "default".to_string(),
    }
}

pub(crate) fn timestamp(time: DateTime<Utc>) -> Timestamp {
    Timestamp {
        seconds: time.timestamp(),
        nanos: time.timestamp_subsec_nanos() as i32,
    }
}

#[derive(Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<KubeObject>,
}

/// Turn `kubectl get -o json` output into release manifest documents
///
/// `single` selects between one object and a `{items: [...]}` list.
pub fn adopted_manifest(json: &[u8], single: bool) -> Result<String> {
    let objects = if single {
        vec![serde_json::from_slice::<KubeObject>(json)?]
    } else {
        serde_json::from_slice::<ObjectList>(json)?.items
    };

    let mut manifest = String::new();
    for mut object in objects {
        object.export();
        let source = format!(
            "{ADOPTED_CHART}/templates/{}.{}.yaml",
            object.name(),
            object.kind.to_lowercase()
        );
        manifest.push_str(&format!("\n---\n# Source: {source}\n"));
        manifest.push_str(&object.to_yaml()?);
    }
    Ok(manifest)
}

/// Adopt `resources` (`kind/name` references) into a new record of `release`
pub fn adopt(
    runner: &dyn CommandRunner,
    release: &str,
    resources: &[String],
    options: &AdoptOptions,
) -> Result<Release> {
    if resources.is_empty() {
        return Err(ReleaseError::NoResources);
    }

    let mut inv = Invocation::new(&options.store.kubectl);
    if let Some(context) = options.store.kube_context.as_deref().filter(|c| !c.is_empty()) {
        inv = inv.args(["--context", context]);
    }
    inv = inv.args(["get", "-o=json"]);
    if options.export {
        inv = inv.arg("--export");
    }
    inv = inv
        .arg(format!("-n={}", options.namespace))
        .args(resources.iter().cloned());

    let out = runner.run(&inv)?;
    let manifest = adopted_manifest(&out.stdout, resources.len() == 1)?;
    if manifest.is_empty() {
        return Err(ReleaseError::NoResources);
    }
    debug!(release, manifest = %manifest, "adopted manifest");

    let store = ReleaseStore::new(runner, options.store.clone());
    let now = timestamp(Utc::now());
    let record = Release {
        name: release.to_string(),
        namespace: options.namespace.clone(),
        version: store.next_version(release)?,
        manifest,
        info: Some(Info {
            status: Some(Status {
                code: StatusCode::Deployed as i32,
                notes: String::new(),
            }),
            first_deployed: Some(now),
            last_deployed: Some(now),
            deleted: None,
            description: "Adopted by helm-x".to_string(),
        }),
        chart: Some(Chart {
            metadata: Some(Metadata {
                name: ADOPTED_CHART.to_string(),
                version: "0.1.0".to_string(),
                api_version: "v1".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    };

    store.create(&record)?;
    info!(
        release,
        version = record.version,
        resources = resources.len(),
        "adopted resources"
    );
    Ok(record)
}
