//! Source staging and normalization
//!
//! A manifest source is copied (or fetched) into a [`StagingDir`] and classified once as a
//! chart, a kustomization or a directory of raw manifests. Each kind is then brought into the
//! `Chart.yaml` + `templates/` layout.

use std::fs;
use std::path::{Path, PathBuf};

use helmx_core::{CommandRunner, Helm, StagingDir, copy_dir_all, is_archive, search_files, single_entry, untar};
use tracing::{debug, info};

use crate::error::Result;
use crate::pipeline::Pipeline;

const KUSTOMIZATION_FILES: &[&str] = &["kustomization.yaml", "kustomization.yml", "Kustomization"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// `Chart.yaml` present
    Chart,
    /// `kustomization.yaml` present, no `Chart.yaml`
    Kustomization,
    /// Neither: a plain directory of manifests
    RawManifests,
}

impl SourceKind {
    /// Classify a directory
    pub fn detect(dir: &Path) -> Self {
        if dir.join("Chart.yaml").exists() {
            SourceKind::Chart
        } else if KUSTOMIZATION_FILES.iter().any(|f| dir.join(f).exists()) {
            SourceKind::Kustomization
        } else {
            SourceKind::RawManifests
        }
    }

    /// Classify a source before it is staged
    ///
    /// Anything that is not a local path is a remote chart reference, and local archives are
    /// packaged charts. A single local manifest file counts as raw manifests.
    pub fn of_source(source: &str) -> Self {
        let path = Path::new(source);
        if path.is_dir() {
            Self::detect(path)
        } else if path.is_file() && !is_archive(path) {
            SourceKind::RawManifests
        } else {
            SourceKind::Chart
        }
    }

    pub fn is_chart(self) -> bool {
        self == SourceKind::Chart
    }
}

/// Copy or fetch `source` into a fresh staging directory
///
/// Remote references go through `helm fetch --untar`, which must leave exactly one chart
/// directory behind.
pub fn stage(
    runner: &dyn CommandRunner,
    helm: &Helm,
    source: &str,
    version: Option<&str>,
) -> Result<StagingDir> {
    let mut staging = StagingDir::new()?;
    let path = Path::new(source);

    if path.is_dir() {
        copy_dir_all(path, staging.path())?;
    } else if path.is_file() {
        let name = path.file_name().map(PathBuf::from).unwrap_or_default();
        let copy = staging.path().join(name);
        fs::copy(path, &copy)?;
        if is_archive(&copy) {
            let root = untar(&copy, staging.path())?;
            staging.set_root(root);
        }
    } else {
        helm.fetch(runner, source, version, staging.path())?;
        let root = single_entry(staging.path())?;
        staging.set_root(root);
    }

    debug!(source, root = %staging.root().display(), "staged manifest source");
    Ok(staging)
}

impl Pipeline<'_> {
    /// Render every `templates/*.yaml` below `chart_dir` and overwrite it with the output
    pub fn render_templates(&self, chart_dir: &Path) -> Result<Vec<PathBuf>> {
        let files = search_files(chart_dir, "templates", ".yaml")?;
        info!(chart = %chart_dir.display(), count = files.len(), "rendering templates");

        for file in &files {
            let rendered = self.helm().render_file(
                self.runner(),
                chart_dir,
                self.release(),
                file,
                &self.options().values,
                self.options().debug,
            )?;
            fs::write(file, rendered)?;
        }

        fs::create_dir_all(chart_dir.join("templates"))?;
        Ok(files)
    }

    /// Move every `*.yaml` of a raw manifest directory under `templates/`
    pub fn adopt_raw_manifests(&self) -> Result<Vec<PathBuf>> {
        let root = self.root();
        let templates = root.join("templates");
        let found = search_files(root, "", ".yaml")?;
        fs::create_dir_all(&templates)?;

        let mut moved = Vec::with_capacity(found.len());
        for file in found {
            let target = match file.file_name() {
                Some(name) => templates.join(name),
                None => continue,
            };
            if file != target {
                fs::rename(&file, &target)?;
            }
            moved.push(target);
        }
        moved.sort();
        moved.dedup();

        info!(count = moved.len(), "moved raw manifests under templates/");
        Ok(moved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChartifyOptions;
    use helmx_core::testing::FakeRunner;
    use helmx_core::{CommandOutput, CoreError, HelmMajor};
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_detect_kinds() {
        let dir = TempDir::new().unwrap();
        assert_eq!(SourceKind::detect(dir.path()), SourceKind::RawManifests);

        write(&dir.path().join("kustomization.yaml"), "resources: []\n");
        assert_eq!(SourceKind::detect(dir.path()), SourceKind::Kustomization);

        write(&dir.path().join("Chart.yaml"), "name: x\n");
        assert_eq!(SourceKind::detect(dir.path()), SourceKind::Chart);
    }

    #[test]
    fn test_of_source() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("pod.yaml");
        write(&manifest, "kind: Pod\n");

        assert_eq!(SourceKind::of_source("stable/nginx"), SourceKind::Chart);
        assert_eq!(
            SourceKind::of_source(&manifest.to_string_lossy()),
            SourceKind::RawManifests
        );
        assert_eq!(
            SourceKind::of_source(&dir.path().to_string_lossy()),
            SourceKind::RawManifests
        );
    }

    #[test]
    fn test_stage_local_dir_runs_nothing() {
        let src = TempDir::new().unwrap();
        write(&src.path().join("deployment.yaml"), "kind: Deployment\n");
        let runner = FakeRunner::new();
        let helm = Helm::new("helm", HelmMajor::V2);

        let staging = stage(&runner, &helm, &src.path().to_string_lossy(), None).unwrap();

        assert_ne!(staging.root(), src.path());
        assert_eq!(
            fs::read_to_string(staging.root().join("deployment.yaml")).unwrap(),
            "kind: Deployment\n"
        );
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_stage_remote_chart() {
        let runner = FakeRunner::new().on("helm", &["fetch"], |inv| {
            let dest = PathBuf::from(&inv.args[4]);
            write(&dest.join("nginx/Chart.yaml"), "name: nginx\nversion: 1.0.0\n");
            Ok(CommandOutput::default())
        });
        let helm = Helm::new("helm", HelmMajor::V2);

        let staging = stage(&runner, &helm, "stable/nginx", Some("1.0.0")).unwrap();

        assert!(staging.root().ends_with("nginx"));
        assert!(staging.root().join("Chart.yaml").is_file());
        let line = &runner.command_lines()[0];
        assert!(line.starts_with("helm fetch stable/nginx --untar -d "));
        assert!(line.ends_with(" --version 1.0.0"));
    }

    #[test]
    fn test_stage_remote_chart_with_extra_entries() {
        let runner = FakeRunner::new().on("helm", &["fetch"], |inv| {
            let dest = PathBuf::from(&inv.args[4]);
            write(&dest.join("nginx/Chart.yaml"), "name: nginx\n");
            write(&dest.join("stray.txt"), "");
            Ok(CommandOutput::default())
        });
        let helm = Helm::new("helm", HelmMajor::V2);

        let err = stage(&runner, &helm, "stable/nginx", None).unwrap_err();
        assert!(matches!(
            err,
            crate::ChartifyError::Core(CoreError::UnexpectedEntries { count: 2, .. })
        ));
    }

    #[test]
    fn test_adopt_raw_manifests() {
        let src = TempDir::new().unwrap();
        write(&src.path().join("deployment.yaml"), "kind: Deployment\n");
        write(&src.path().join("extra/service.yaml"), "kind: Service\n");
        write(&src.path().join("README.md"), "docs\n");

        let runner = FakeRunner::new();
        let helm = Helm::new("helm", HelmMajor::V2);
        let options = ChartifyOptions::default();
        let staging = stage(&runner, &helm, &src.path().to_string_lossy(), None).unwrap();
        let pipeline = Pipeline::new(&runner, &helm, "kustomize", "myapp", &options, staging);

        let files = pipeline.adopt_raw_manifests().unwrap();

        let root = pipeline.root();
        assert_eq!(
            files,
            vec![
                root.join("templates/deployment.yaml"),
                root.join("templates/service.yaml"),
            ]
        );
        assert!(!root.join("deployment.yaml").exists());
        assert!(root.join("README.md").exists());
    }

    #[test]
    fn test_render_templates_overwrites_in_place() {
        let src = TempDir::new().unwrap();
        write(&src.path().join("Chart.yaml"), "name: web\nversion: 0.1.0\n");
        write(&src.path().join("templates/deploy.yaml"), "replicas: {{ .Values.n }}\n");
        write(&src.path().join("templates/NOTES.txt"), "notes\n");

        let runner = FakeRunner::new().stdout("helm", &["template"], "replicas: 3\n");
        let helm = Helm::new("helm", HelmMajor::V2);
        let options = ChartifyOptions::default();
        let staging = stage(&runner, &helm, &src.path().to_string_lossy(), None).unwrap();
        let pipeline = Pipeline::new(&runner, &helm, "kustomize", "web", &options, staging);

        let files = pipeline.render_templates(pipeline.root()).unwrap();

        assert_eq!(files, vec![pipeline.root().join("templates/deploy.yaml")]);
        assert_eq!(fs::read_to_string(&files[0]).unwrap(), "replicas: 3\n");
        assert_eq!(runner.calls().len(), 1);
    }
}
