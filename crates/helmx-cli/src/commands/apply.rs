//! Apply / upgrade command - chartify, optionally adopt, then `helm upgrade`

use clap::Args;
use console::style;
use helmx_core::{CommandRunner, Helm, Invocation};
use helmx_release::{AdoptOptions, SERVICE_ACCOUNT_NAMESPACE_FILE, adopt, resolve_namespace};
use std::path::Path;
use tracing::info;

use super::{ChartDir, ChartifyArgs, KubeArgs, TlsArgs, ToolArgs, chartify};
use crate::error::Result;
use crate::exit_codes;

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Release name
    pub release: String,

    /// Directory of manifests, kustomization or chart, or a remote chart reference
    pub dir_or_chart: String,

    #[command(flatten)]
    pub chartify: ChartifyArgs,

    #[command(flatten)]
    pub kube: KubeArgs,

    #[command(flatten)]
    pub tls: TlsArgs,

    /// Seconds to wait for any individual Kubernetes operation (like Jobs for hooks)
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Simulate an upgrade
    #[arg(long)]
    pub dry_run: bool,

    /// Install the release if missing (default: true for apply, false for upgrade)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub install: Option<bool>,

    /// Reset values to the ones built into the chart
    #[arg(long)]
    pub reset_values: bool,

    /// Existing resources (kind/name) adopted into the release before upgrading
    #[arg(long, value_delimiter = ',', value_name = "KIND/NAME")]
    pub adopt: Vec<String>,

    /// Do not pass --export to `kubectl get` when adopting (kubectl 1.18+)
    #[arg(long)]
    pub no_export: bool,
}

/// `helm upgrade` command line for a finished chart
pub fn upgrade_invocation(
    helm: &Helm,
    args: &ApplyArgs,
    chart: &str,
    install: bool,
    debug: bool,
) -> Invocation {
    let mut inv = helm
        .command()
        .args(["upgrade", args.release.as_str(), chart])
        .args(args.chartify.value_args().flags())
        .args(["--timeout".to_string(), helm.timeout_arg(args.timeout)]);
    if install {
        inv = inv.arg("--install");
    }
    if args.reset_values {
        inv = inv.arg("--reset-values");
    }
    inv = inv
        .args(args.chartify.value_args().namespace_flags())
        .args(args.kube.context_flags());
    if args.dry_run {
        inv = inv.arg("--dry-run");
    }
    if debug {
        inv = inv.arg("--debug");
    }
    inv.args(args.tls.flags())
}

/// Run `apply` (`install_by_default`) or `upgrade`
pub fn run(
    runner: &dyn CommandRunner,
    tools: &ToolArgs,
    args: &ApplyArgs,
    install_by_default: bool,
    debug: bool,
) -> Result<i32> {
    let helm = tools.helm(runner)?;
    let staging = chartify(
        runner,
        &helm,
        tools,
        &args.release,
        &args.dir_or_chart,
        &args.chartify,
        debug,
    )?;
    let chart = ChartDir::new(staging, debug);

    if !args.adopt.is_empty() {
        let options = AdoptOptions {
            namespace: resolve_namespace(
                args.chartify.namespace.as_deref(),
                Path::new(SERVICE_ACCOUNT_NAMESPACE_FILE),
            ),
            export: !args.no_export,
            store: args.kube.store_config(tools),
        };
        let record = adopt(runner, &args.release, &args.adopt, &options)?;
        eprintln!(
            "{} Adopted {} resource(s) into {} (revision {})",
            style("✓").green().bold(),
            args.adopt.len(),
            style(&args.release).cyan(),
            record.version
        );
    }

    let install = args.install.unwrap_or(install_by_default);
    let inv = upgrade_invocation(&helm, args, &chart.as_arg(), install, debug).inherit_stdio();
    info!(release = %args.release, install, "upgrading release");
    runner.run(&inv)?;

    Ok(exit_codes::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use helmx_core::HelmMajor;
    use helmx_core::testing::FakeRunner;
    use std::fs;
    use tempfile::TempDir;

    #[derive(Parser)]
    struct Cmd {
        #[command(flatten)]
        args: ApplyArgs,
    }

    fn parse(argv: &[&str]) -> ApplyArgs {
        Cmd::parse_from(std::iter::once("apply").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_install_flag_forms() {
        assert_eq!(parse(&["web", "./chart"]).install, None);
        assert_eq!(parse(&["web", "./chart", "--install"]).install, Some(true));
        assert_eq!(parse(&["web", "./chart", "--install=false"]).install, Some(false));
    }

    #[test]
    fn test_adopt_is_comma_separated() {
        let args = parse(&["web", "./chart", "--adopt", "deploy/web,svc/web", "--adopt", "cm/x"]);
        assert_eq!(args.adopt, vec!["deploy/web", "svc/web", "cm/x"]);
    }

    #[test]
    fn test_upgrade_invocation_helm3() {
        let args = parse(&[
            "web",
            "./chart",
            "--set",
            "a=b",
            "-f",
            "v.yaml",
            "--namespace",
            "prod",
            "--kubecontext",
            "dev",
            "--timeout",
            "60",
            "--reset-values",
            "--dry-run",
            "--tls",
        ]);
        let helm = Helm::new("helm", HelmMajor::V3);

        let inv = upgrade_invocation(&helm, &args, "/tmp/chart", true, false);

        assert_eq!(
            inv.command_line(),
            "helm upgrade web /tmp/chart --set a=b -f v.yaml --timeout 60s --install --reset-values \
             --namespace prod --kube-context dev --dry-run --tls"
        );
    }

    #[test]
    fn test_upgrade_runs_after_chartify() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("svc.yaml"), "kind: Service\n").unwrap();
        let source = dir.path().to_string_lossy().into_owned();
        let args = parse(&["web", source.as_str(), "--version", "1.0.0"]);
        let tools = ToolArgs {
            helm_bin: "helm".to_string(),
            helm3: false,
            kubectl_bin: "kubectl".to_string(),
            kustomize_bin: "kustomize".to_string(),
        };
        let runner = FakeRunner::new()
            .stdout("helm", &["version"], "Client: v2.16.1+gbbdfe5e")
            .stdout("helm", &["upgrade"], "");

        let code = run(&runner, &tools, &args, true, false).unwrap();

        assert_eq!(code, exit_codes::SUCCESS);
        let calls = runner.calls();
        let upgrade = calls.last().unwrap();
        assert!(upgrade.args_start_with(&["upgrade", "web"]));
        assert!(upgrade.args.contains(&"--install".to_string()));
        assert!(upgrade.args.contains(&"300".to_string()));
    }
}
