//! The chartify pipeline
//!
//! [`Chartify::run`] validates every option up front, stages the source and then hands a
//! [`Pipeline`] through the normalize, dependency, patch and inject stages. The returned
//! [`StagingDir`] holds a chart ready for `helm upgrade`, `helm diff` or `helm template`.

use std::path::{Path, PathBuf};

use helmx_core::{ChartMetadata, CommandRunner, Helm, Invocation, StagingDir};
use tracing::{info, warn};

use crate::dependency::AdhocDependency;
use crate::error::{ChartifyError, Result};
use crate::inject::Injector;
use crate::options::ChartifyOptions;
use crate::patch::PatchSet;
use crate::source::{SourceKind, stage};

/// State shared by every stage of one chartify run
///
/// Owns the staging directory; subprocesses go through the injected runner.
pub struct Pipeline<'a> {
    runner: &'a dyn CommandRunner,
    helm: &'a Helm,
    kustomize_bin: &'a str,
    release: &'a str,
    options: &'a ChartifyOptions,
    staging: StagingDir,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        helm: &'a Helm,
        kustomize_bin: &'a str,
        release: &'a str,
        options: &'a ChartifyOptions,
        staging: StagingDir,
    ) -> Self {
        Self {
            runner,
            helm,
            kustomize_bin,
            release,
            options,
            staging,
        }
    }

    /// Chart root inside the staging directory
    pub fn root(&self) -> &Path {
        self.staging.root()
    }

    pub fn runner(&self) -> &'a dyn CommandRunner {
        self.runner
    }

    pub fn helm(&self) -> &'a Helm {
        self.helm
    }

    pub fn release(&self) -> &'a str {
        self.release
    }

    pub fn options(&self) -> &'a ChartifyOptions {
        self.options
    }

    pub(crate) fn kustomize(&self) -> Invocation {
        Invocation::new(self.kustomize_bin)
    }

    pub fn into_staging(self) -> StagingDir {
        self.staging
    }
}

/// Everything derived from the options before any file is touched
struct Plan {
    kind: SourceKind,
    chart: Option<ChartMetadata>,
    dependencies: Vec<AdhocDependency>,
    patches: PatchSet,
    injectors: Vec<Injector>,
}

impl Plan {
    fn validate(release: &str, source: &str, options: &ChartifyOptions) -> Result<Self> {
        let kind = SourceKind::of_source(source);

        if kind == SourceKind::Kustomization && !options.values.set_values.is_empty() {
            return Err(ChartifyError::SetWithKustomization);
        }

        let chart = match kind {
            SourceKind::Chart => None,
            _ => {
                let version = options
                    .chart_version
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .ok_or(ChartifyError::MissingVersion)?;
                Some(ChartMetadata::synthesize(release, version)?)
            }
        };

        let dependencies = options
            .adhoc_dependencies
            .iter()
            .map(|spec| spec.parse())
            .collect::<Result<Vec<AdhocDependency>>>()?;

        let patches = PatchSet::load(&options.json_patches, &options.strategic_merge_patches)?;
        let injectors = Injector::parse_all(&options.injectors, &options.injects)?;

        Ok(Self {
            kind,
            chart,
            dependencies,
            patches,
            injectors,
        })
    }
}

/// Entry point turning a manifest source into a chart
pub struct Chartify<'a> {
    runner: &'a dyn CommandRunner,
    helm: &'a Helm,
    kustomize_bin: String,
}

impl<'a> Chartify<'a> {
    pub fn new(runner: &'a dyn CommandRunner, helm: &'a Helm) -> Self {
        Self {
            runner,
            helm,
            kustomize_bin: "kustomize".to_string(),
        }
    }

    pub fn with_kustomize_bin(mut self, bin: impl Into<String>) -> Self {
        self.kustomize_bin = bin.into();
        self
    }

    /// Run every stage and return the staging directory holding the finished chart
    ///
    /// Configuration errors surface before any subprocess runs. On a stage failure the
    /// staging directory is dropped with the error.
    pub fn run(&self, release: &str, source: &str, options: &ChartifyOptions) -> Result<StagingDir> {
        let plan = Plan::validate(release, source, options)?;

        let staging = stage(
            self.runner,
            self.helm,
            source,
            options.chart_version.as_deref(),
        )?;
        info!(source, kind = ?plan.kind, dir = %staging.root().display(), "chartifying");

        let pipeline = Pipeline::new(
            self.runner,
            self.helm,
            &self.kustomize_bin,
            release,
            options,
            staging,
        );

        let mut files = match plan.kind {
            SourceKind::Chart => pipeline.render_templates(pipeline.root())?,
            SourceKind::Kustomization => pipeline.kustomize_build()?,
            SourceKind::RawManifests => pipeline.adopt_raw_manifests()?,
        };

        if let Some(chart) = &plan.chart {
            chart.write(pipeline.root())?;
        }

        let flattened = pipeline.flatten_dependencies(&plan.dependencies)?;
        union(&mut files, flattened);

        if !plan.patches.is_empty() {
            if plan.kind.is_chart() {
                files = pipeline.patch(&files, &plan.patches)?;
            } else {
                warn!(kind = ?plan.kind, "patches are only applied to chart sources, ignoring");
            }
        }

        pipeline.inject(&files, &plan.injectors)?;

        Ok(pipeline.into_staging())
    }
}

fn union(files: &mut Vec<PathBuf>, more: Vec<PathBuf>) {
    for file in more {
        if !files.contains(&file) {
            files.push(file);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmx_core::testing::FakeRunner;
    use helmx_core::{CommandOutput, HelmMajor, ValueArgs};
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn src(dir: &TempDir) -> String {
        dir.path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_raw_manifests_end_to_end() {
        let dir = TempDir::new().unwrap();
        let deployment = "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: web\n";
        write(&dir.path().join("deployment.yaml"), deployment);

        let runner = FakeRunner::new();
        let helm = Helm::new("helm", HelmMajor::V2);
        let options = ChartifyOptions::default().chart_version(Some("1.0.0".to_string()));

        let staging = Chartify::new(&runner, &helm)
            .run("myapp", &src(&dir), &options)
            .unwrap();

        let chart = ChartMetadata::load(staging.root()).unwrap();
        assert_eq!(chart.name, "myapp");
        assert_eq!(chart.version, "1.0.0");
        assert_eq!(chart.app_version.as_deref(), Some("1.0.0"));
        assert_eq!(
            fs::read_to_string(staging.root().join("templates/deployment.yaml")).unwrap(),
            deployment
        );
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_raw_manifests_require_version() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("deployment.yaml"), "kind: Deployment\n");
        let runner = FakeRunner::new();
        let helm = Helm::new("helm", HelmMajor::V2);

        let err = Chartify::new(&runner, &helm)
            .run("myapp", &src(&dir), &ChartifyOptions::default())
            .unwrap_err();

        assert!(matches!(err, ChartifyError::MissingVersion));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_kustomization_with_set_fails_before_any_subprocess() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("kustomization.yaml"), "resources:\n- deploy.yaml\n");
        let runner = FakeRunner::new();
        let helm = Helm::new("helm", HelmMajor::V2);
        let options = ChartifyOptions::new(ValueArgs {
            set_values: vec!["foo=bar".to_string()],
            ..Default::default()
        })
        .chart_version(Some("1.0.0".to_string()));

        let err = Chartify::new(&runner, &helm)
            .run("myapp", &src(&dir), &options)
            .unwrap_err();

        assert!(matches!(err, ChartifyError::SetWithKustomization));
        assert!(err.to_string().contains("not yet supported"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_kustomization_end_to_end() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("kustomization.yaml"), "resources:\n- deploy.yaml\n");
        write(&dir.path().join("deploy.yaml"), "kind: Deployment\n");

        let runner = FakeRunner::new().on("kustomize", &["build"], |inv| {
            fs::write(&inv.args[3], "kind: Deployment\nmetadata:\n  name: built\n").unwrap();
            Ok(CommandOutput::default())
        });
        let helm = Helm::new("helm", HelmMajor::V2);
        let options = ChartifyOptions::default().chart_version(Some("0.1.0".to_string()));

        let staging = Chartify::new(&runner, &helm)
            .run("myapp", &src(&dir), &options)
            .unwrap();

        assert!(staging.root().join("Chart.yaml").is_file());
        assert!(
            fs::read_to_string(staging.root().join("templates/kustomized.yaml"))
                .unwrap()
                .contains("name: built")
        );
    }

    #[test]
    fn test_chart_end_to_end_with_patch_and_injector() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("Chart.yaml"), "name: web\nversion: 0.1.0\n");
        write(&dir.path().join("templates/deploy.yaml"), "{{ template }}\n");
        let patch = dir.path().join("smp.yaml");
        write(&patch, "kind: Deployment\nspec:\n  replicas: 3\n");

        let runner = FakeRunner::new()
            .stdout("helm", &["template"], "kind: Deployment\n")
            .on("kustomize", &["build"], |inv| {
                fs::write(&inv.args[3], "kind: Deployment\nspec:\n  replicas: 3\n").unwrap();
                Ok(CommandOutput::default())
            })
            .on("sidecar", &[], |inv| {
                let content = fs::read_to_string(&inv.args[0]).unwrap();
                Ok(CommandOutput::new(format!("{content}# injected\n")))
            });
        let helm = Helm::new("helm", HelmMajor::V2);
        let mut options = ChartifyOptions::default();
        options.strategic_merge_patches.push(patch);
        options.injects.push("sidecar FILE".to_string());

        let staging = Chartify::new(&runner, &helm)
            .run("web", &src(&dir), &options)
            .unwrap();

        let root = staging.root();
        assert!(!root.join("templates/deploy.yaml").exists());
        assert_eq!(
            fs::read_to_string(root.join("templates/helmx.patched.yaml")).unwrap(),
            "kind: Deployment\nspec:\n  replicas: 3\n# injected\n"
        );

        let programs: Vec<_> = runner.calls().into_iter().map(|c| c.program).collect();
        assert_eq!(programs, vec!["helm", "kustomize", "sidecar"]);
    }

    fn write_subchart_archive(path: &Path) {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let file = fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in [
            ("mysql/Chart.yaml", "name: mysql\nversion: 1.2.3\n"),
            ("mysql/templates/statefulset.yaml", "{{ template }}\n"),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_chart_end_to_end_with_adhoc_dependency() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("Chart.yaml"), "name: web\nversion: 0.1.0\n");
        write(&dir.path().join("templates/deploy.yaml"), "{{ template }}\n");

        let runner = FakeRunner::new()
            .on("helm", &["template"], |inv| {
                let kind = if inv.args.iter().any(|a| a.contains("mysql")) {
                    "StatefulSet"
                } else {
                    "Deployment"
                };
                Ok(CommandOutput::new(format!("kind: {kind}\n")))
            })
            .stdout(
                "helm",
                &["repo", "list"],
                "NAME  \tURL\nstable\thttps://charts.example.com/stable\n",
            )
            .on("helm", &["dependency", "build"], |inv| {
                let root = Path::new(&inv.args[2]);
                let requirements = fs::read_to_string(root.join("requirements.yaml")).unwrap();
                assert!(requirements.contains("alias: db"));
                assert!(requirements.contains("condition: db.enabled"));
                fs::create_dir_all(root.join("charts")).unwrap();
                write_subchart_archive(&root.join("charts/mysql-1.2.3.tgz"));
                Ok(CommandOutput::default())
            });
        let helm = Helm::new("helm", HelmMajor::V2);
        let mut options = ChartifyOptions::default();
        options.adhoc_dependencies.push("db=stable/mysql:1.2.3".to_string());

        let staging = Chartify::new(&runner, &helm)
            .run("web", &src(&dir), &options)
            .unwrap();

        let root = staging.root();
        assert_eq!(
            fs::read_to_string(root.join("templates/deploy.yaml")).unwrap(),
            "kind: Deployment\n"
        );
        assert_eq!(
            fs::read_to_string(root.join("charts/mysql/templates/statefulset.yaml")).unwrap(),
            "kind: StatefulSet\n"
        );
        assert!(!root.join("charts/mysql-1.2.3.tgz").exists());
        assert!(!root.join("requirements.yaml").exists());
        assert_eq!(ChartMetadata::load(root).unwrap().name, "web");

        let lines = runner.command_lines();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("helm template"));
        assert_eq!(lines[1], "helm repo list");
        assert!(lines[2].starts_with("helm dependency build"));
        assert!(lines[3].contains("statefulset.yaml"));
    }

    #[test]
    fn test_patches_ignored_for_raw_manifests() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("deployment.yaml"), "kind: Deployment\n");
        let patch = TempDir::new().unwrap();
        let smp = patch.path().join("smp.yaml");
        write(&smp, "kind: Deployment\n");

        let runner = FakeRunner::new();
        let helm = Helm::new("helm", HelmMajor::V2);
        let mut options = ChartifyOptions::default().chart_version(Some("1.0.0".to_string()));
        options.strategic_merge_patches.push(smp);

        Chartify::new(&runner, &helm)
            .run("myapp", &src(&dir), &options)
            .unwrap();
        assert!(runner.calls().is_empty());
    }
}
