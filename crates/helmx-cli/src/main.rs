//! helm-x CLI - turn manifests, kustomizations and charts into Helm releases

use std::process::ExitCode;

use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser, Subcommand};
use helmx_core::SystemRunner;

mod commands;
mod error;
mod exit_codes;
mod logging;

use commands::ToolArgs;
use commands::adopt::AdoptArgs;
use commands::apply::ApplyArgs;
use commands::diff::DiffArgs;
use commands::dump::DumpArgs;
use commands::template::TemplateArgs;

#[derive(Parser)]
#[command(name = "helm-x")]
#[command(version)]
#[command(
    about = "Turn Kubernetes manifests, Kustomization, Helm Chart into Helm release. Sidecar injection supported.",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output and keep the temporary chart
    #[arg(
        long,
        global = true,
        env = "HELM_X_DEBUG",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    debug: bool,

    /// Log level (0-3) or filter directive
    #[arg(long, global = true, env = "HELM_X_VERBOSITY", hide = true)]
    verbosity: Option<String>,

    #[command(flatten)]
    tools: ToolArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Install or upgrade a release built from manifests, a kustomization or a chart
    Apply(ApplyArgs),

    /// Same as apply, without installing missing releases unless --install is given
    Upgrade(ApplyArgs),

    /// Show a diff explaining what `helm x apply` would change
    Diff(DiffArgs),

    /// Print the Kubernetes manifests `helm x apply` would install
    Template(TemplateArgs),

    /// Adopt existing Kubernetes resources as a Helm release
    Adopt(AdoptArgs),

    /// Dump the latest release record of a release
    Dump(DumpArgs),

    /// Any other subcommand is run by helm
    #[command(external_subcommand)]
    Helm(Vec<String>),
}

fn run(cli: &Cli) -> error::Result<i32> {
    let runner = SystemRunner::new();
    let tools = &cli.tools;

    match &cli.command {
        Commands::Apply(args) => commands::apply::run(&runner, tools, args, true, cli.debug),
        Commands::Upgrade(args) => commands::apply::run(&runner, tools, args, false, cli.debug),
        Commands::Diff(args) => commands::diff::run(&runner, tools, args, cli.debug),
        Commands::Template(args) => {
            commands::template::run(&runner, tools, args, cli.debug, &mut std::io::stdout())
        }
        Commands::Adopt(args) => commands::adopt::run(&runner, tools, args),
        Commands::Dump(args) => commands::dump::run(&runner, tools, args, &mut std::io::stdout()),
        Commands::Helm(args) => commands::fallback::run(&runner, &tools.helm_bin, args),
    }
}

fn main() -> ExitCode {
    // Setup miette for nice error display
    miette::set_panic_hook();

    let cli = Cli::parse();
    logging::init(cli.verbosity.as_deref(), cli.debug);

    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            let code = err.exit_code();
            eprintln!("{:?}", miette::Report::new(err));
            code
        }
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
