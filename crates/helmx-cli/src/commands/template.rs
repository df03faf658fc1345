//! Template command - print the manifests `apply` would install

use std::io::Write;

use clap::Args;
use helmx_core::{CommandRunner, Helm, HelmMajor, Invocation};
use helmx_release::{InstallManifestOptions, template_to_install};

use super::{ChartDir, ChartifyArgs, ToolArgs, chartify};
use crate::error::Result;
use crate::exit_codes;

#[derive(Args, Debug, Clone)]
pub struct TemplateArgs {
    /// Directory of manifests, kustomization or chart, or a remote chart reference
    pub dir_or_chart: String,

    #[command(flatten)]
    pub chartify: ChartifyArgs,

    /// Release name
    #[arg(long, default_value = "release-name")]
    pub name: String,

    /// Namespace in which release ConfigMaps/Secrets reside
    #[arg(long, env = "TILLER_NAMESPACE", default_value = "kube-system")]
    pub tiller_namespace: String,

    /// Remove hooks from the output and append the release ConfigMap `helm install` would create
    #[arg(long)]
    pub include_release_configmap: bool,

    /// Remove hooks from the output and append the release Secret `helm install` would create
    #[arg(long)]
    pub include_release_secret: bool,
}

impl TemplateArgs {
    pub fn install_options(&self) -> InstallManifestOptions {
        InstallManifestOptions {
            release: self.name.clone(),
            chart: self.dir_or_chart.clone(),
            chart_version: self.chartify.version.clone().unwrap_or_default(),
            namespace: self
                .chartify
                .namespace
                .clone()
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| "default".to_string()),
            tiller_namespace: self.tiller_namespace.clone(),
            include_configmap: self.include_release_configmap,
            include_secret: self.include_release_secret,
        }
    }
}

pub fn template_invocation(helm: &Helm, args: &TemplateArgs, chart: &str, debug: bool) -> Invocation {
    let values = args.chartify.value_args();
    let mut inv = match helm.major() {
        HelmMajor::V2 => helm
            .command()
            .args(["template", chart, "--name", args.name.as_str()]),
        HelmMajor::V3 => helm.command().args(["template", args.name.as_str(), chart]),
    };
    inv = inv.args(values.flags()).args(values.namespace_flags());
    if debug {
        inv = inv.arg("--debug");
    }
    inv
}

pub fn run(
    runner: &dyn CommandRunner,
    tools: &ToolArgs,
    args: &TemplateArgs,
    debug: bool,
    out: &mut dyn Write,
) -> Result<i32> {
    let helm = tools.helm(runner)?;
    let staging = chartify(
        runner,
        &helm,
        tools,
        &args.name,
        &args.dir_or_chart,
        &args.chartify,
        debug,
    )?;
    let chart = ChartDir::new(staging, debug);

    let rendered = runner
        .run(&template_invocation(&helm, args, &chart.as_arg(), debug))?
        .stdout_str();
    let output = template_to_install(&rendered, &args.install_options())?;

    writeln!(out, "{output}")?;
    Ok(exit_codes::SUCCESS)
}
