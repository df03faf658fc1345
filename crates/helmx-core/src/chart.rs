//! `Chart.yaml` and `requirements.yaml`

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoreError, Result};

pub const CHART_FILE: &str = "Chart.yaml";
pub const REQUIREMENTS_FILE: &str = "requirements.yaml";
pub const REQUIREMENTS_LOCK_FILE: &str = "requirements.lock";

/// Chart metadata as found in `Chart.yaml`
///
/// Only the fields helm-x reads or writes are typed; everything else survives in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    pub name: String,

    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,

    #[serde(
        default,
        deserialize_with = "opt_scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ChartMetadata {
    /// Metadata for a chart generated from plain manifests
    ///
    /// `version` doubles as the app version and must be valid semver.
    pub fn synthesize(name: &str, version: &str) -> Result<Self> {
        semver::Version::parse(version)?;
        Ok(Self {
            api_version: Some("v1".to_string()),
            name: name.to_string(),
            version: version.to_string(),
            app_version: Some(version.to_string()),
            description: None,
            extra: BTreeMap::new(),
        })
    }

    pub fn load(chart_dir: &Path) -> Result<Self> {
        let path = chart_dir.join(CHART_FILE);
        let content = fs::read_to_string(&path)?;
        serde_yaml::from_str(&content).map_err(|e| CoreError::InvalidChart {
            path,
            message: e.to_string(),
        })
    }

    pub fn write(&self, chart_dir: &Path) -> Result<()> {
        fs::write(chart_dir.join(CHART_FILE), serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

/// One entry of `requirements.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub name: String,

    #[serde(default)]
    pub repository: String,

    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Contents of `requirements.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    #[serde(default)]
    pub dependencies: Vec<Requirement>,
}

impl Requirements {
    /// Read `requirements.yaml` from a chart directory
    ///
    /// A missing file, an empty file or a file without a `dependencies` key all yield an
    /// empty list.
    pub fn load(chart_dir: &Path) -> Result<Self> {
        let path = chart_dir.join(REQUIREMENTS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let invalid = |e: serde_yaml::Error| CoreError::InvalidRequirements {
            path: path.clone(),
            message: e.to_string(),
        };

        let doc: serde_yaml::Value = serde_yaml::from_str(&content).map_err(invalid)?;
        match doc.get("dependencies") {
            None | Some(serde_yaml::Value::Null) => Ok(Self::default()),
            Some(deps) => Ok(Self {
                dependencies: serde_yaml::from_value(deps.clone()).map_err(invalid)?,
            }),
        }
    }

    pub fn save(&self, chart_dir: &Path) -> Result<()> {
        fs::write(chart_dir.join(REQUIREMENTS_FILE), serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Delete `requirements.yaml` and `requirements.lock` if present
    pub fn remove(chart_dir: &Path) -> Result<()> {
        for name in [REQUIREMENTS_FILE, REQUIREMENTS_LOCK_FILE] {
            let path = chart_dir.join(name);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

fn scalar_to_string<E: serde::de::Error>(value: serde_yaml::Value) -> std::result::Result<String, E> {
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Null => Ok(String::new()),
        other => Err(E::custom(format!("expected a scalar, found {other:?}"))),
    }
}

// Versions like `1.0` are parsed as floats by YAML
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    scalar_to_string(serde_yaml::Value::deserialize(deserializer)?)
}

fn opt_scalar_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    let s = scalar_to_string(serde_yaml::Value::deserialize(deserializer)?)?;
    Ok((!s.is_empty()).then_some(s))
}
