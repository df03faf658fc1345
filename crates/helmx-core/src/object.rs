//! Typed Kubernetes object model
//!
//! Only the envelope (`apiVersion`, `kind`, `metadata`) is typed. Every other key is kept
//! in a trailing map so objects survive a parse/serialize round trip.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Metadata fields assigned by the API server, dropped when exporting
pub const SERVER_ASSIGNED_METADATA: &[&str] = &["generation", "resourceVersion", "selfLink", "uid"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KubeObject {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl KubeObject {
    pub fn from_yaml(doc: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(doc)?)
    }

    pub fn from_json_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }

    /// Strip server-generated state so the object can be re-applied elsewhere
    ///
    /// `generateName` is promoted into `name`; `generation`, `resourceVersion`, `selfLink`,
    /// `uid` and the top-level `status` are removed.
    pub fn export(&mut self) {
        if let Some(generate_name) = self.metadata.generate_name.take() {
            self.metadata.name = Some(generate_name);
        }
        for field in SERVER_ASSIGNED_METADATA {
            self.metadata.rest.remove(*field);
        }
        self.rest.remove("status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_export_strips_server_fields() {
        let mut obj = KubeObject::from_json_value(json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "generateName": "web-",
                "namespace": "default",
                "generation": 3,
                "resourceVersion": "12345",
                "selfLink": "/api/v1/namespaces/default/pods/web-abc",
                "uid": "0d6f",
                "creationTimestamp": "2019-01-01T00:00:00Z"
            },
            "spec": {"containers": [{"name": "web", "image": "nginx"}]},
            "status": {"phase": "Running"}
        }))
        .unwrap();

        obj.export();

        assert_eq!(obj.name(), "web-");
        assert!(obj.metadata.generate_name.is_none());
        for field in SERVER_ASSIGNED_METADATA {
            assert!(!obj.metadata.rest.contains_key(*field), "{field} kept");
        }
        assert!(obj.metadata.rest.contains_key("creationTimestamp"));
        assert!(!obj.rest.contains_key("status"));
        assert!(obj.rest.contains_key("spec"));
    }

    #[test]
    fn test_yaml_round_trip_keeps_unknown_fields() {
        let doc = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n  annotations:\n    helm.sh/hook: pre-install\nspec:\n  replicas: 2\n";
        let obj = KubeObject::from_yaml(doc).unwrap();

        assert_eq!(obj.kind, "Deployment");
        assert_eq!(obj.annotation("helm.sh/hook"), Some("pre-install"));
        assert_eq!(obj.rest["spec"]["replicas"], json!(2));

        let again = KubeObject::from_yaml(&obj.to_yaml().unwrap()).unwrap();
        assert_eq!(again, obj);
    }
}
