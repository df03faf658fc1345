//! Adopt command - turn existing resources into a Helm release

use std::path::Path;

use clap::Args;
use console::style;
use helmx_core::CommandRunner;
use helmx_release::{AdoptOptions, SERVICE_ACCOUNT_NAMESPACE_FILE, adopt, resolve_namespace};

use super::{KubeArgs, ToolArgs};
use crate::error::Result;
use crate::exit_codes;

#[derive(Args, Debug, Clone)]
pub struct AdoptArgs {
    /// Release name
    pub release: String,

    /// Resources to adopt, as kind/name (e.g. configmap/foo secret/bar deployment/myapp)
    #[arg(required = true, value_name = "KIND/NAME")]
    pub resources: Vec<String>,

    /// Namespace in which the resources to be adopted reside
    #[arg(long)]
    pub namespace: Option<String>,

    /// Do not pass --export to `kubectl get` (kubectl 1.18+)
    #[arg(long)]
    pub no_export: bool,

    #[command(flatten)]
    pub kube: KubeArgs,
}

pub fn run(runner: &dyn CommandRunner, tools: &ToolArgs, args: &AdoptArgs) -> Result<i32> {
    let options = AdoptOptions {
        namespace: resolve_namespace(
            args.namespace.as_deref(),
            Path::new(SERVICE_ACCOUNT_NAMESPACE_FILE),
        ),
        export: !args.no_export,
        store: args.kube.store_config(tools),
    };

    let record = adopt(runner, &args.release, &args.resources, &options)?;

    eprintln!(
        "{} Adopted {} resource(s) from namespace {} into release {} (revision {})",
        style("✓").green().bold(),
        args.resources.len(),
        style(&options.namespace).cyan(),
        style(&record.name).cyan(),
        record.version
    );
    Ok(exit_codes::SUCCESS)
}
