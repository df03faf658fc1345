//! Helm binary wrapper
//!
//! Builds `helm` command lines for the subcommands helm-x relies on, following the argument
//! conventions of the detected Helm major version.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::exec::{CommandRunner, ExecError, Invocation};

/// Major version of the helm binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelmMajor {
    V2,
    V3,
}

/// Values forwarded to every `helm template` / `helm upgrade` / `helm diff`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueArgs {
    pub set_values: Vec<String>,
    pub values_files: Vec<PathBuf>,
    pub namespace: Option<String>,
}

impl ValueArgs {
    /// `--set` flags followed by `-f` flags
    pub fn flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        for set in &self.set_values {
            flags.push("--set".to_string());
            flags.push(set.clone());
        }
        for file in &self.values_files {
            flags.push("-f".to_string());
            flags.push(file.to_string_lossy().into_owned());
        }
        flags
    }

    pub fn namespace_flags(&self) -> Vec<String> {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => vec!["--namespace".to_string(), ns.clone()],
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Helm {
    bin: String,
    major: HelmMajor,
}

impl Helm {
    pub fn new(bin: impl Into<String>, major: HelmMajor) -> Self {
        Self {
            bin: bin.into(),
            major,
        }
    }

    /// Determine the helm major version
    ///
    /// `force_v3` short-circuits detection; otherwise `helm version --client --short` is
    /// consulted and anything not starting with `v3.` is treated as Helm 2.
    pub fn detect(
        runner: &dyn CommandRunner,
        bin: &str,
        force_v3: bool,
    ) -> Result<Self, ExecError> {
        if force_v3 {
            return Ok(Self::new(bin, HelmMajor::V3));
        }

        let out = runner.run(&Invocation::new(bin).args(["version", "--client", "--short"]))?;
        let version = out.stdout_trimmed();
        let major = if version.trim_start().starts_with("v3.") {
            HelmMajor::V3
        } else {
            HelmMajor::V2
        };
        debug!(%version, ?major, "detected helm version");

        Ok(Self::new(bin, major))
    }

    pub fn bin(&self) -> &str {
        &self.bin
    }

    pub fn major(&self) -> HelmMajor {
        self.major
    }

    pub fn is_v3(&self) -> bool {
        self.major == HelmMajor::V3
    }

    pub fn command(&self) -> Invocation {
        Invocation::new(&self.bin)
    }

    /// `--timeout` value; Helm 3 expects a duration
    pub fn timeout_arg(&self, seconds: u64) -> String {
        match self.major {
            HelmMajor::V2 => seconds.to_string(),
            HelmMajor::V3 => format!("{seconds}s"),
        }
    }

    /// `helm fetch <chart> --untar -d <dest> [--version <v>]`
    pub fn fetch(
        &self,
        runner: &dyn CommandRunner,
        chart: &str,
        version: Option<&str>,
        dest: &Path,
    ) -> Result<(), ExecError> {
        let mut inv = self
            .command()
            .args(["fetch", chart, "--untar", "-d"])
            .arg_path(dest);
        if let Some(version) = version {
            inv = inv.args(["--version", version]);
        }
        runner.run(&inv)?;
        Ok(())
    }

    /// Raw `helm repo list` output; an empty repository list is not an error
    pub fn repo_list(&self, runner: &dyn CommandRunner) -> Result<String, ExecError> {
        match runner.run(&self.command().args(["repo", "list"])) {
            Ok(out) => Ok(out.stdout_trimmed()),
            Err(err) if err.stderr().is_some_and(|s| s.contains("no repositories")) => {
                Ok(String::new())
            }
            Err(err) => Err(err),
        }
    }

    pub fn dependency_build(
        &self,
        runner: &dyn CommandRunner,
        chart_dir: &Path,
    ) -> Result<(), ExecError> {
        runner.run(&self.command().args(["dependency", "build"]).arg_path(chart_dir))?;
        Ok(())
    }

    /// Render one template file of a chart and return the output
    ///
    /// Value precedence: `--set`, the chart's own `values.yaml`, then the user's values files.
    pub fn render_file(
        &self,
        runner: &dyn CommandRunner,
        chart_dir: &Path,
        release: &str,
        file: &Path,
        values: &ValueArgs,
        debug: bool,
    ) -> Result<Vec<u8>, ExecError> {
        let chart = chart_dir.to_string_lossy().into_owned();
        let mut inv = match self.major {
            HelmMajor::V2 => self
                .command()
                .args(["template".to_string(), format!("--debug={debug}"), chart])
                .args(["--name", release, "-x"])
                .arg_path(file),
            HelmMajor::V3 => {
                let rel = file.strip_prefix(chart_dir).unwrap_or(file);
                let mut inv = self
                    .command()
                    .args(["template", release])
                    .arg(chart)
                    .arg("--show-only")
                    .arg_path(rel);
                if debug {
                    inv = inv.arg("--debug");
                }
                inv
            }
        };

        for set in &values.set_values {
            inv = inv.args(["--set", set.as_str()]);
        }
        let default_values = chart_dir.join("values.yaml");
        if default_values.exists() {
            inv = inv.arg("-f").arg_path(&default_values);
        }
        for file in &values.values_files {
            inv = inv.arg("-f").arg_path(file);
        }
        inv = inv.args(values.namespace_flags());

        Ok(runner.run(&inv)?.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::testing::FakeRunner;
    use tempfile::TempDir;

    #[test]
    fn test_detect() {
        let runner = FakeRunner::new().stdout("helm", &["version"], "v3.2.4+g0ad800e\n");
        assert!(Helm::detect(&runner, "helm", false).unwrap().is_v3());

        let runner = FakeRunner::new().stdout("helm", &["version"], "Client: v2.16.1+gbbdfe5e\n");
        assert_eq!(
            Helm::detect(&runner, "helm", false).unwrap().major(),
            HelmMajor::V2
        );

        let runner = FakeRunner::new();
        assert!(Helm::detect(&runner, "helm", true).unwrap().is_v3());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_value_flags_order() {
        let values = ValueArgs {
            set_values: vec!["a=1".to_string()],
            values_files: vec![PathBuf::from("prod.yaml")],
            namespace: Some("web".to_string()),
        };
        assert_eq!(values.flags(), vec!["--set", "a=1", "-f", "prod.yaml"]);
        assert_eq!(values.namespace_flags(), vec!["--namespace", "web"]);
        assert!(ValueArgs::default().namespace_flags().is_empty());
    }

    #[test]
    fn test_render_file_v2() {
        let chart = TempDir::new().unwrap();
        std::fs::write(chart.path().join("values.yaml"), "replicas: 1\n").unwrap();
        let file = chart.path().join("templates/deploy.yaml");
        let runner = FakeRunner::new().on("helm", &["template"], |_| {
            Ok(CommandOutput::new("kind: Deployment\n"))
        });

        let values = ValueArgs {
            set_values: vec!["image.tag=v2".to_string()],
            values_files: vec![PathBuf::from("prod.yaml")],
            namespace: Some("web".to_string()),
        };
        let out = Helm::new("helm", HelmMajor::V2)
            .render_file(&runner, chart.path(), "myapp", &file, &values, false)
            .unwrap();
        assert_eq!(out, b"kind: Deployment\n");

        let c = chart.path().display();
        assert_eq!(
            runner.command_lines(),
            vec![format!(
                "helm template --debug=false {c} --name myapp -x {c}/templates/deploy.yaml --set image.tag=v2 -f {c}/values.yaml -f prod.yaml --namespace web"
            )]
        );
    }

    #[test]
    fn test_render_file_v3_uses_relative_show_only() {
        let chart = TempDir::new().unwrap();
        let file = chart.path().join("templates/svc.yaml");
        let runner = FakeRunner::new().stdout("helm", &["template"], "");

        Helm::new("helm", HelmMajor::V3)
            .render_file(&runner, chart.path(), "myapp", &file, &ValueArgs::default(), true)
            .unwrap();

        let c = chart.path().display();
        assert_eq!(
            runner.command_lines(),
            vec![format!(
                "helm template myapp {c} --show-only templates/svc.yaml --debug"
            )]
        );
    }

    #[test]
    fn test_repo_list_tolerates_no_repositories() {
        let runner = FakeRunner::new().fail(
            "helm",
            &["repo", "list"],
            1,
            "Error: no repositories to show",
        );
        let helm = Helm::new("helm", HelmMajor::V3);
        assert_eq!(helm.repo_list(&runner).unwrap(), "");
    }

    #[test]
    fn test_timeout_arg() {
        assert_eq!(Helm::new("helm", HelmMajor::V2).timeout_arg(300), "300");
        assert_eq!(Helm::new("helm", HelmMajor::V3).timeout_arg(300), "300s");
    }
}
