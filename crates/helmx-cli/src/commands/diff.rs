//! Diff command - show what `apply` would change, through the helm-diff plugin

use clap::Args;
use helmx_core::{CommandRunner, ExecError, Helm, Invocation};
use tracing::info;

use super::{ChartDir, ChartifyArgs, KubeArgs, TlsArgs, ToolArgs, chartify};
use crate::error::Result;
use crate::exit_codes;

#[derive(Args, Debug, Clone)]
pub struct DiffArgs {
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

    /// Reset values to the ones built into the chart
    #[arg(long)]
    pub reset_values: bool,

    /// Show the full manifest as an addition when the release does not exist yet
    #[arg(long)]
    pub allow_unreleased: bool,

    /// Exit with status 2 when changes are detected
    #[arg(long)]
    pub detailed_exitcode: bool,
}

pub fn diff_invocation(helm: &Helm, args: &DiffArgs, chart: &str) -> Invocation {
    let values = args.chartify.value_args();
    let mut inv = helm
        .command()
        .args(["diff", "upgrade", args.release.as_str(), chart])
        .args(["--context", "3"])
        .args(values.flags());
    if args.reset_values {
        inv = inv.arg("--reset-values");
    }
    inv = inv
        .arg("--suppress-secrets")
        .args(values.namespace_flags())
        .args(args.kube.context_flags());
    if let Some(version) = args.chartify.version.as_deref().filter(|v| !v.is_empty()) {
        inv = inv.args(["--version", version]);
    }
    inv = inv.args(args.tls.flags());
    if args.allow_unreleased {
        inv = inv.arg("--allow-unreleased");
    }
    if args.detailed_exitcode {
        inv = inv.arg("--detailed-exitcode");
    }
    inv
}

/// Run `helm diff upgrade`; `true` when it reported changes with exit status 2
pub fn diff(runner: &dyn CommandRunner, inv: &Invocation) -> std::result::Result<bool, ExecError> {
    match runner.run(inv) {
        Ok(_) => Ok(false),
        Err(err) if err.exit_code() == Some(exit_codes::DIFF_CHANGES) => Ok(true),
        Err(err) => Err(err),
    }
}

pub fn run(runner: &dyn CommandRunner, tools: &ToolArgs, args: &DiffArgs, debug: bool) -> Result<i32> {
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

    let changed = diff(runner, &diff_invocation(&helm, args, &chart.as_arg()).inherit_stdio())?;
    info!(release = %args.release, changed, "diff finished");

    Ok(if changed {
        exit_codes::DIFF_CHANGES
    } else {
        exit_codes::SUCCESS
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use helmx_core::HelmMajor;
    use helmx_core::testing::FakeRunner;

    #[derive(Parser)]
    struct Cmd {
        #[command(flatten)]
        args: DiffArgs,
    }

    fn parse(argv: &[&str]) -> DiffArgs {
        Cmd::parse_from(std::iter::once("diff").chain(argv.iter().copied())).args
    }

    #[test]
    fn test_diff_invocation() {
        let args = parse(&[
            "web",
            "./chart",
            "--set",
            "a=b",
            "--namespace",
            "prod",
            "--kubecontext",
            "dev",
            "--version",
            "1.2.0",
            "--tls",
            "--allow-unreleased",
            "--detailed-exitcode",
        ]);
        let inv = diff_invocation(&Helm::new("helm", HelmMajor::V2), &args, "/tmp/chart");

        assert_eq!(
            inv.command_line(),
            "helm diff upgrade web /tmp/chart --context 3 --set a=b --suppress-secrets \
             --namespace prod --kube-context dev --version 1.2.0 --tls --allow-unreleased \
             --detailed-exitcode"
        );
    }

    #[test]
    fn test_diff_exit_status() {
        let inv = Invocation::new("helm").args(["diff", "upgrade"]);

        let clean = FakeRunner::new().stdout("helm", &["diff"], "");
        assert!(!diff(&clean, &inv).unwrap());

        let changed = FakeRunner::new().fail("helm", &["diff"], 2, "");
        assert!(diff(&changed, &inv).unwrap());

        let broken = FakeRunner::new().fail("helm", &["diff"], 1, "Error: release web failed");
        let err = diff(&broken, &inv).unwrap_err();
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(err.to_string(), "Error: release web failed");
    }
}
