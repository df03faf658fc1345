//! CLI commands

use std::path::PathBuf;

use clap::{ArgAction, Args};
use clap::builder::FalseyValueParser;
use console::style;
use helmx_chartify::{Chartify, ChartifyOptions};
use helmx_core::{CommandRunner, Helm, StagingDir, ValueArgs};
use helmx_release::{ReleaseStoreConfig, StorageBackend};
use tracing::info;

use crate::error::Result;

pub mod adopt;
pub mod apply;
pub mod diff;
pub mod dump;
pub mod fallback;
pub mod template;

/// External binaries
#[derive(Args, Debug, Clone)]
pub struct ToolArgs {
    /// helm binary name or path
    #[arg(long, env = "HELM_BIN", default_value = "helm", global = true, hide = true)]
    pub helm_bin: String,

    /// Use Helm 3 argument conventions without asking `helm version`
    #[arg(
        long,
        env = "HELM_X_HELM3",
        global = true,
        hide = true,
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    pub helm3: bool,

    #[arg(long, env = "KUBECTL_BIN", default_value = "kubectl", global = true, hide = true)]
    pub kubectl_bin: String,

    #[arg(long, env = "KUSTOMIZE_BIN", default_value = "kustomize", global = true, hide = true)]
    pub kustomize_bin: String,
}

impl ToolArgs {
    pub fn helm(&self, runner: &dyn CommandRunner) -> Result<Helm> {
        Ok(Helm::detect(runner, &self.helm_bin, self.helm3)?)
    }
}

/// Flags shaping the temporary chart
#[derive(Args, Debug, Clone, Default)]
pub struct ChartifyArgs {
    /// Values file(s) (can specify multiple)
    #[arg(short = 'f', long = "values")]
    pub values: Vec<PathBuf>,

    /// Set values on the command line (can specify multiple)
    #[arg(long = "set")]
    pub set: Vec<String>,

    /// Namespace to install the release into
    #[arg(long)]
    pub namespace: Option<String>,

    /// Chart version to fetch, or version of the chart generated from manifests
    #[arg(long)]
    pub version: Option<String>,

    /// Injector command run on every manifest, with FILE replaced by the manifest path
    #[arg(long = "inject", value_name = "CMD")]
    pub inject: Vec<String>,

    /// Deprecated injector syntax: 'CMD SUBCMD,FLAG1=VAL1,FLAG2=VAL2'
    #[arg(long = "injector", value_name = "DESCRIPTOR")]
    pub injector: Vec<String>,

    /// Dependency added to the temporary chart: ALIAS=REPO/CHART:VERSION
    #[arg(long = "dependency", alias = "adhoc-dependency", value_name = "DEP")]
    pub dependency: Vec<String>,

    /// Kustomize JSON patch file applied to the rendered manifests
    #[arg(long = "json-patch", value_name = "FILE")]
    pub json_patch: Vec<PathBuf>,

    /// Kustomize strategic merge patch file applied to the rendered manifests
    #[arg(long = "strategic-merge-patch", value_name = "FILE")]
    pub strategic_merge_patch: Vec<PathBuf>,
}

impl ChartifyArgs {
    pub fn value_args(&self) -> ValueArgs {
        ValueArgs {
            set_values: self.set.clone(),
            values_files: self.values.clone(),
            namespace: self.namespace.clone().filter(|ns| !ns.is_empty()),
        }
    }

    pub fn options(&self, debug: bool) -> ChartifyOptions {
        ChartifyOptions {
            debug,
            injectors: self.injector.clone(),
            injects: self.inject.clone(),
            adhoc_dependencies: self.dependency.clone(),
            json_patches: self.json_patch.clone(),
            strategic_merge_patches: self.strategic_merge_patch.clone(),
            ..ChartifyOptions::new(self.value_args())
        }
        .chart_version(self.version.clone())
    }
}

/// Cluster access
#[derive(Args, Debug, Clone)]
pub struct KubeArgs {
    /// Name of the kubeconfig context to use
    #[arg(long = "kubecontext", alias = "kube-context")]
    pub kube_context: Option<String>,

    /// Namespace in which release ConfigMaps/Secrets reside
    #[arg(long, env = "TILLER_NAMESPACE", default_value = "kube-system")]
    pub tiller_namespace: String,

    /// Kind of object release records are stored in: configmaps or secrets
    #[arg(long, default_value = "configmaps")]
    pub tiller_storage_backend: StorageBackend,
}

impl KubeArgs {
    pub fn store_config(&self, tools: &ToolArgs) -> ReleaseStoreConfig {
        ReleaseStoreConfig {
            tiller_namespace: self.tiller_namespace.clone(),
            backend: self.tiller_storage_backend,
            kube_context: self.kube_context.clone().filter(|c| !c.is_empty()),
            kubectl: tools.kubectl_bin.clone(),
        }
    }

    pub fn context_flags(&self) -> Vec<String> {
        match self.kube_context.as_deref() {
            Some(context) if !context.is_empty() => {
                vec!["--kube-context".to_string(), context.to_string()]
            }
            _ => Vec::new(),
        }
    }
}

/// Tiller TLS
#[derive(Args, Debug, Clone, Default)]
pub struct TlsArgs {
    /// Enable TLS for requests to Tiller
    #[arg(long)]
    pub tls: bool,

    /// Path to TLS certificate file
    #[arg(long, value_name = "FILE")]
    pub tls_cert: Option<String>,

    /// Path to TLS key file
    #[arg(long, value_name = "FILE")]
    pub tls_key: Option<String>,
}

impl TlsArgs {
    pub fn flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.tls {
            flags.push("--tls".to_string());
        }
        if let Some(cert) = self.tls_cert.as_deref().filter(|c| !c.is_empty()) {
            flags.extend(["--tls-cert".to_string(), cert.to_string()]);
        }
        if let Some(key) = self.tls_key.as_deref().filter(|k| !k.is_empty()) {
            flags.extend(["--tls-key".to_string(), key.to_string()]);
        }
        flags
    }
}

/// Build the temporary chart for `source`
pub fn chartify(
    runner: &dyn CommandRunner,
    helm: &Helm,
    tools: &ToolArgs,
    release: &str,
    source: &str,
    args: &ChartifyArgs,
    debug: bool,
) -> Result<StagingDir> {
    let options = args.options(debug);
    let staging = Chartify::new(runner, helm)
        .with_kustomize_bin(&tools.kustomize_bin)
        .run(release, source, &options)?;
    info!(chart = %staging.root().display(), "chart ready");
    Ok(staging)
}

/// Staging directory cleanup: removed on drop, kept for inspection with `--debug`
pub struct ChartDir {
    _staging: Option<StagingDir>,
    path: PathBuf,
}

impl ChartDir {
    pub fn new(staging: StagingDir, debug: bool) -> Self {
        if debug {
            let path = staging.keep();
            eprintln!(
                "{} helm chart has been written to {} for you to see. please remove it afterwards",
                style("DEBUG").dim(),
                style(path.display()).cyan()
            );
            Self {
                _staging: None,
                path,
            }
        } else {
            let path = staging.root().to_path_buf();
            Self {
                _staging: Some(staging),
                path,
            }
        }
    }

    pub fn as_arg(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chartify_args_to_options() {
        let args = ChartifyArgs {
            set: vec!["a=b".to_string()],
            namespace: Some(String::new()),
            version: Some("1.0.0".to_string()),
            injector: vec!["istioctl kube-inject,f=FILE".to_string()],
            dependency: vec!["db=stable/mysql:1.2.3".to_string()],
            ..Default::default()
        };

        let options = args.options(true);

        assert!(options.debug);
        assert_eq!(options.chart_version.as_deref(), Some("1.0.0"));
        assert_eq!(options.values.set_values, vec!["a=b"]);
        assert_eq!(options.values.namespace, None);
        assert_eq!(options.injectors.len(), 1);
        assert_eq!(options.adhoc_dependencies, vec!["db=stable/mysql:1.2.3"]);
    }

    #[test]
    fn test_tls_flags() {
        assert!(TlsArgs::default().flags().is_empty());
        let tls = TlsArgs {
            tls: true,
            tls_cert: Some("cert.pem".to_string()),
            tls_key: None,
        };
        assert_eq!(tls.flags(), vec!["--tls", "--tls-cert", "cert.pem"]);
    }

    #[test]
    fn test_chart_dir_keeps_debug_output() {
        let staging = StagingDir::new().unwrap();
        let root = staging.root().to_path_buf();

        let kept = ChartDir::new(staging, true);
        assert_eq!(kept.as_arg(), root.to_string_lossy());
        drop(kept);
        assert!(root.exists());
        std::fs::remove_dir_all(&root).unwrap();

        let staging = StagingDir::new().unwrap();
        let root = staging.root().to_path_buf();
        let temporary = ChartDir::new(staging, false);
        assert_eq!(temporary.as_arg(), root.to_string_lossy());
        drop(temporary);
        assert!(!root.exists());
    }
}
