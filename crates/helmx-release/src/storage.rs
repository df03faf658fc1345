//! Release storage in ConfigMaps or Secrets
//!
//! Records follow Helm 2's storage drivers:
//! - object name `<release>.v<version>`, in the Tiller namespace
//! - labels `NAME`, `OWNER=TILLER`, `STATUS`, `VERSION`
//! - a single data entry `release` holding the encoded record
//!
//! [`ReleaseStore`] reads and writes them through `kubectl`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use helmx_core::{CommandRunner, Invocation};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::codec::{decode_release, encode_release};
use crate::error::{ReleaseError, Result};
use crate::proto::Release;

/// Maximum encoded size of one record
pub const MAX_RELEASE_SIZE: usize = 1024 * 1024;

/// Data key holding the encoded record
pub const RELEASE_KEY: &str = "release";

pub const OWNER: &str = "TILLER";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StorageBackend {
    #[default]
    ConfigMaps,
    Secrets,
}

impl StorageBackend {
    /// `kubectl` resource name
    pub fn resource(self) -> &'static str {
        match self {
            StorageBackend::ConfigMaps => "configmaps",
            StorageBackend::Secrets => "secrets",
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.resource())
    }
}

impl FromStr for StorageBackend {
    type Err = ReleaseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "configmap" | "configmaps" => Ok(StorageBackend::ConfigMaps),
            "secret" | "secrets" => Ok(StorageBackend::Secrets),
            _ => Err(ReleaseError::UnknownBackend(s.to_string())),
        }
    }
}

pub fn storage_key(name: &str, version: i32) -> String {
    format!("{name}.v{version}")
}

pub fn storage_labels(release: &Release) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("NAME".to_string(), release.name.clone()),
        ("OWNER".to_string(), OWNER.to_string()),
        ("STATUS".to_string(), release.status_code().label().to_string()),
        ("VERSION".to_string(), release.version.to_string()),
    ])
}

/// A release record wrapped in its Kubernetes object
#[derive(Debug, Clone, PartialEq)]
pub enum StorageObject {
    ConfigMap(ConfigMap),
    Secret(Secret),
}

impl StorageObject {
    /// Encode `release` into a storage object placed in `namespace`
    pub fn new(backend: StorageBackend, release: &Release, namespace: &str) -> Result<Self> {
        let encoded = encode_release(release)?;
        if encoded.len() > MAX_RELEASE_SIZE {
            return Err(ReleaseError::ReleaseTooLarge {
                size: encoded.len(),
                max: MAX_RELEASE_SIZE,
            });
        }

        let metadata = ObjectMeta {
            name: Some(storage_key(&release.name, release.version)),
            namespace: Some(namespace.to_string()),
            labels: Some(storage_labels(release)),
            ..Default::default()
        };

        Ok(match backend {
            StorageBackend::ConfigMaps => StorageObject::ConfigMap(ConfigMap {
                metadata,
                data: Some(BTreeMap::from([(RELEASE_KEY.to_string(), encoded)])),
                ..Default::default()
            }),
            StorageBackend::Secrets => StorageObject::Secret(Secret {
                metadata,
                data: Some(BTreeMap::from([(
                    RELEASE_KEY.to_string(),
                    ByteString(encoded.into_bytes()),
                )])),
                ..Default::default()
            }),
        })
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    fn metadata(&self) -> &ObjectMeta {
        match self {
            StorageObject::ConfigMap(cm) => &cm.metadata,
            StorageObject::Secret(secret) => &secret.metadata,
        }
    }

    /// The encoded `release` entry
    pub fn release_data(&self) -> Result<String> {
        let data = match self {
            StorageObject::ConfigMap(cm) => cm
                .data
                .as_ref()
                .and_then(|data| data.get(RELEASE_KEY))
                .cloned(),
            StorageObject::Secret(secret) => secret
                .data
                .as_ref()
                .and_then(|data| data.get(RELEASE_KEY))
                .map(|bytes| String::from_utf8_lossy(&bytes.0).into_owned()),
        };
        data.ok_or_else(|| ReleaseError::MissingReleaseData {
            name: self.name().to_string(),
        })
    }

    pub fn decode(&self) -> Result<Release> {
        decode_release(&self.release_data()?)
    }

    /// Manifest form, with `apiVersion` and `kind`
    pub fn to_yaml(&self) -> Result<String> {
        Ok(match self {
            StorageObject::ConfigMap(cm) => serde_yaml::to_string(cm)?,
            StorageObject::Secret(secret) => serde_yaml::to_string(secret)?,
        })
    }
}

/// Where release records live and how `kubectl` reaches them
#[derive(Debug, Clone)]
pub struct ReleaseStoreConfig {
    pub tiller_namespace: String,
    pub backend: StorageBackend,
    pub kube_context: Option<String>,
    pub kubectl: String,
}

impl Default for ReleaseStoreConfig {
    fn default() -> Self {
        Self {
            tiller_namespace: "kube-system".to_string(),
            backend: StorageBackend::default(),
            kube_context: None,
            kubectl: "kubectl".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// `kubectl`-backed access to the release records of the Tiller namespace
pub struct ReleaseStore<'a> {
    runner: &'a dyn CommandRunner,
    config: ReleaseStoreConfig,
}

impl<'a> ReleaseStore<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: ReleaseStoreConfig) -> Self {
        Self { runner, config }
    }

    pub fn config(&self) -> &ReleaseStoreConfig {
        &self.config
    }

    fn kubectl(&self) -> Invocation {
        let inv = Invocation::new(&self.config.kubectl);
        match &self.config.kube_context {
            Some(context) if !context.is_empty() => inv.arg("--context").arg(context),
            _ => inv,
        }
    }

    fn get_items<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        let inv = self.kubectl().args([
            "get".to_string(),
            self.config.backend.resource().to_string(),
            "-n".to_string(),
            self.config.tiller_namespace.clone(),
            "-l".to_string(),
            format!("NAME={name},OWNER={OWNER}"),
            "-o".to_string(),
            "json".to_string(),
        ]);
        let out = self.runner.run(&inv)?;
        let list: ItemList<T> = serde_json::from_slice(&out.stdout)?;
        Ok(list.items)
    }

    /// Every record of `name`, oldest first
    pub fn list(&self, name: &str) -> Result<Vec<Release>> {
        let objects: Vec<StorageObject> = match self.config.backend {
            StorageBackend::ConfigMaps => self
                .get_items::<ConfigMap>(name)?
                .into_iter()
                .map(StorageObject::ConfigMap)
                .collect(),
            StorageBackend::Secrets => self
                .get_items::<Secret>(name)?
                .into_iter()
                .map(StorageObject::Secret)
                .collect(),
        };

        let mut releases = objects
            .iter()
            .map(StorageObject::decode)
            .collect::<Result<Vec<_>>>()?;
        releases.sort_by_key(|r| r.version);
        debug!(release = name, count = releases.len(), "listed release records");
        Ok(releases)
    }

    /// The record with the highest version
    pub fn latest(&self, name: &str) -> Result<Release> {
        self.list(name)?
            .pop()
            .ok_or_else(|| ReleaseError::ReleaseNotFound {
                name: name.to_string(),
                namespace: self.config.tiller_namespace.clone(),
            })
    }

    /// Highest stored version plus one, 1 for a new release
    pub fn next_version(&self, name: &str) -> Result<i32> {
        Ok(self
            .list(name)?
            .iter()
            .map(|r| r.version)
            .max()
            .unwrap_or(0)
            + 1)
    }

    /// Write `release` as a new storage object with `kubectl create -f -`
    pub fn create(&self, release: &Release) -> Result<StorageObject> {
        let object =
            StorageObject::new(self.config.backend, release, &self.config.tiller_namespace)?;
        let inv = self
            .kubectl()
            .args(["create", "-f", "-"])
            .stdin(object.to_yaml()?);
        self.runner.run(&inv)?;

        info!(
            object = object.name(),
            backend = %self.config.backend,
            namespace = %self.config.tiller_namespace,
            "stored release record"
        );
        Ok(object)
    }
}
