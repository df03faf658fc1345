//! Patching through a generated kustomize overlay
//!
//! The rendered manifests become the `resources` of a `kustomization.yaml` written at the chart
//! root, next to copies of every JSON 6902 and strategic-merge patch. `kustomize build` collapses
//! the overlay into a single file that replaces its inputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ChartifyError, Result};
use crate::pipeline::Pipeline;

/// Output of the patch stage, relative to the chart root
pub const PATCHED_FILE: &str = "templates/helmx.patched.yaml";

const KUSTOMIZATION_FILE: &str = "kustomization.yaml";
const JSON_PATCH_DIR: &str = "jsonpatches";
const STRATEGIC_MERGE_DIR: &str = "strategicmergepatches";

/// Where the operations of a JSON patch come from
#[derive(Debug, Clone, PartialEq)]
pub enum JsonPatchSource {
    /// An operations file kustomize reads itself, relative to the chart root
    Path(String),
    /// Operations embedded in the descriptor
    Inline(Vec<serde_yaml::Value>),
}

/// A JSON 6902 patch descriptor: `target` plus exactly one of `path` or `patch`
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPatchSpec {
    pub file: PathBuf,
    pub target: BTreeMap<String, String>,
    pub source: JsonPatchSource,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct Descriptor {
    target: BTreeMap<String, String>,
    patch: Vec<serde_yaml::Value>,
    path: String,
}

impl JsonPatchSpec {
    pub fn load(file: &Path) -> Result<Self> {
        let invalid = |reason: String| ChartifyError::InvalidJsonPatch {
            file: file.to_path_buf(),
            reason,
        };

        let content = fs::read_to_string(file).map_err(|e| invalid(e.to_string()))?;
        let doc: serde_yaml::Value =
            serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        let descriptor: Descriptor = if doc.is_null() {
            Descriptor::default()
        } else {
            serde_yaml::from_value(doc).map_err(|e| invalid(e.to_string()))?
        };

        let source = match (descriptor.path.is_empty(), descriptor.patch.is_empty()) {
            (false, true) => JsonPatchSource::Path(descriptor.path),
            (true, false) => JsonPatchSource::Inline(descriptor.patch),
            (true, true) => return Err(invalid("either \"path\" or \"patch\" must be set".into())),
            (false, false) => {
                return Err(invalid("only one of \"path\" or \"patch\" may be set".into()));
            }
        };

        Ok(Self {
            file: file.to_path_buf(),
            target: descriptor.target,
            source,
        })
    }
}

/// Every patch of a run, loaded and validated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchSet {
    pub json: Vec<JsonPatchSpec>,
    /// Strategic-merge patch documents, in order
    pub strategic_merge: Vec<(PathBuf, String)>,
}

impl PatchSet {
    pub fn load(json_patches: &[PathBuf], strategic_merge_patches: &[PathBuf]) -> Result<Self> {
        let json = json_patches
            .iter()
            .map(|file| JsonPatchSpec::load(file))
            .collect::<Result<Vec<_>>>()?;

        let strategic_merge = strategic_merge_patches
            .iter()
            .map(|file| Ok((file.clone(), fs::read_to_string(file)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            json,
            strategic_merge,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.json.is_empty() && self.strategic_merge.is_empty()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Kustomization {
    resources: Vec<String>,
    #[serde(rename = "patchesJson6902", skip_serializing_if = "Vec::is_empty")]
    patches_json6902: Vec<JsonPatchEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    patches_strategic_merge: Vec<String>,
}

#[derive(Serialize)]
struct JsonPatchEntry {
    target: BTreeMap<String, String>,
    path: String,
}

fn relative(root: &Path, file: &Path) -> String {
    file.strip_prefix(root)
        .unwrap_or(file)
        .to_string_lossy()
        .into_owned()
}

impl Pipeline<'_> {
    /// Write the overlay for `files`, build it and delete the inputs
    ///
    /// Returns the single patched file.
    pub fn patch(&self, files: &[PathBuf], patches: &PatchSet) -> Result<Vec<PathBuf>> {
        let root = self.root();
        let output = root.join(PATCHED_FILE);
        info!(count = files.len(), "patching manifests");

        let mut kustomization = Kustomization {
            resources: files.iter().map(|f| relative(root, f)).collect(),
            patches_json6902: Vec::new(),
            patches_strategic_merge: Vec::new(),
        };

        for (index, spec) in patches.json.iter().enumerate() {
            let path = match &spec.source {
                JsonPatchSource::Path(path) => path.clone(),
                JsonPatchSource::Inline(operations) => {
                    let path = format!("{JSON_PATCH_DIR}/patch.{index}.yaml");
                    write_file(&root.join(&path), &serde_yaml::to_string(operations)?)?;
                    path
                }
            };
            kustomization.patches_json6902.push(JsonPatchEntry {
                target: spec.target.clone(),
                path,
            });
        }

        for (index, (_, content)) in patches.strategic_merge.iter().enumerate() {
            let path = format!("{STRATEGIC_MERGE_DIR}/patch.{index}.yaml");
            write_file(&root.join(&path), content)?;
            kustomization.patches_strategic_merge.push(path);
        }

        let overlay = serde_yaml::to_string(&kustomization)?;
        debug!(kustomization = %overlay, "generated overlay");
        fs::write(root.join(KUSTOMIZATION_FILE), overlay)?;

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        self.build_overlay(root, &output)?;

        for file in files {
            if *file != output && file.exists() {
                fs::remove_file(file)?;
            }
        }

        Ok(vec![output])
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChartifyOptions;
    use helmx_core::testing::FakeRunner;
    use helmx_core::{CommandOutput, Helm, HelmMajor, StagingDir};
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_descriptor_requires_path_or_patch() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bad.yaml");
        write(&file, "target:\n  kind: Deployment\n");

        let err = JsonPatchSpec::load(&file).unwrap_err();

        assert!(matches!(err, ChartifyError::InvalidJsonPatch { .. }));
        let message = err.to_string();
        assert!(message.contains("either \"path\" or \"patch\" must be set"));
        assert!(message.contains("bad.yaml"));
    }

    #[test]
    fn test_descriptor_rejects_both() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("both.yaml");
        write(
            &file,
            "target:\n  kind: Deployment\npath: ops.yaml\npatch:\n- op: remove\n  path: /spec\n",
        );

        let err = JsonPatchSpec::load(&file).unwrap_err();
        assert!(err.to_string().contains("only one of"));
    }

    #[test]
    fn test_load_inline_and_path() {
        let dir = TempDir::new().unwrap();
        let inline = dir.path().join("inline.yaml");
        let by_path = dir.path().join("path.yaml");
        write(
            &inline,
            "target:\n  kind: Deployment\n  name: web\npatch:\n- op: replace\n  path: /spec/replicas\n  value: 3\n",
        );
        write(&by_path, "target:\n  kind: Service\npath: ops/service.yaml\n");

        let set = PatchSet::load(&[inline, by_path], &[]).unwrap();

        assert_eq!(set.json[0].target["name"], "web");
        assert!(matches!(&set.json[0].source, JsonPatchSource::Inline(ops) if ops.len() == 1));
        assert_eq!(
            set.json[1].source,
            JsonPatchSource::Path("ops/service.yaml".to_string())
        );
        assert!(!set.is_empty());
    }

    #[test]
    fn test_missing_strategic_merge_patch() {
        let err = PatchSet::load(&[], &[PathBuf::from("/nonexistent/smp.yaml")]).unwrap_err();
        assert!(matches!(err, ChartifyError::Io(_)));
    }

    fn patch_fixture(dir: &TempDir) -> PatchSet {
        let json = dir.path().join("json.yaml");
        let smp = dir.path().join("smp.yaml");
        write(
            &json,
            "target:\n  kind: Deployment\n  name: web\npatch:\n- op: replace\n  path: /spec/replicas\n  value: 3\n",
        );
        write(&smp, "kind: Service\nmetadata:\n  name: web\n");
        PatchSet::load(&[json], &[smp]).unwrap()
    }

    /// A stand-in for `kustomize build` that concatenates the overlay's resources and applies
    /// one idempotent edit
    fn fake_kustomize() -> FakeRunner {
        FakeRunner::new().on("kustomize", &["build"], |inv| {
            let root = Path::new(&inv.args[1]);
            let overlay: serde_yaml::Value =
                serde_yaml::from_str(&fs::read_to_string(root.join(KUSTOMIZATION_FILE)).unwrap())
                    .unwrap();
            let mut out = String::new();
            for resource in overlay["resources"].as_sequence().unwrap() {
                let content = fs::read_to_string(root.join(resource.as_str().unwrap())).unwrap();
                out.push_str(&content.replace("replicas: 1", "replicas: 3"));
            }
            fs::write(&inv.args[3], out).unwrap();
            Ok(CommandOutput::default())
        })
    }

    #[test]
    fn test_patch_writes_overlay() {
        let dir = TempDir::new().unwrap();
        let patches = patch_fixture(&dir);
        let runner = fake_kustomize();
        let helm = Helm::new("helm", HelmMajor::V2);
        let options = ChartifyOptions::default();
        let pipeline = Pipeline::new(
            &runner,
            &helm,
            "kustomize",
            "web",
            &options,
            StagingDir::new().unwrap(),
        );
        let root = pipeline.root().to_path_buf();
        let input = root.join("templates/deploy.yaml");
        write(&input, "kind: Deployment\nspec:\n  replicas: 1\n");

        let files = pipeline.patch(&[input.clone()], &patches).unwrap();

        assert_eq!(files, vec![root.join(PATCHED_FILE)]);
        assert!(!input.exists());
        assert_eq!(
            fs::read_to_string(&files[0]).unwrap(),
            "kind: Deployment\nspec:\n  replicas: 3\n"
        );
        insta::assert_snapshot!(fs::read_to_string(root.join(KUSTOMIZATION_FILE)).unwrap(), @r"
        resources:
        - templates/deploy.yaml
        patchesJson6902:
        - target:
            kind: Deployment
            name: web
          path: jsonpatches/patch.0.yaml
        patchesStrategicMerge:
        - strategicmergepatches/patch.0.yaml
        ");
        assert_eq!(
            fs::read_to_string(root.join("strategicmergepatches/patch.0.yaml")).unwrap(),
            "kind: Service\nmetadata:\n  name: web\n"
        );
        assert!(
            fs::read_to_string(root.join("jsonpatches/patch.0.yaml"))
                .unwrap()
                .contains("path: /spec/replicas")
        );
    }

    #[test]
    fn test_patch_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let patches = patch_fixture(&dir);
        let runner = fake_kustomize();
        let helm = Helm::new("helm", HelmMajor::V2);
        let options = ChartifyOptions::default();
        let pipeline = Pipeline::new(
            &runner,
            &helm,
            "kustomize",
            "web",
            &options,
            StagingDir::new().unwrap(),
        );
        let input = pipeline.root().join("templates/deploy.yaml");
        write(&input, "kind: Deployment\nspec:\n  replicas: 1\n");

        let first = pipeline.patch(&[input], &patches).unwrap();
        let once = fs::read(&first[0]).unwrap();
        let second = pipeline.patch(&first, &patches).unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read(&second[0]).unwrap(), once);
    }
}
