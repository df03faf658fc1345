//! Helm fallback - subcommands helm-x does not know are run by helm itself

use helmx_core::{CommandRunner, ExecError, Invocation};
use tracing::debug;

use crate::error::Result;
use crate::exit_codes;

/// `helm dependency` output for a directory without a chart, which is not an error for helm-x
const MISSING_CHART_METADATA: &str = "Error: chart metadata (Chart.yaml) missing";

/// Run `helm <args...>` and return the status to exit with
pub fn run(runner: &dyn CommandRunner, helm_bin: &str, args: &[String]) -> Result<i32> {
    let inv = Invocation::new(helm_bin).args(args.iter().cloned());
    debug!(command = %inv, "forwarding to helm");

    if args.first().is_some_and(|cmd| cmd == "dependency") {
        return match runner.run(&inv) {
            Ok(out) => {
                print!("{}", out.stdout_str());
                Ok(exit_codes::SUCCESS)
            }
            Err(err) if err.stderr().is_some_and(|s| s.contains(MISSING_CHART_METADATA)) => {
                Ok(exit_codes::SUCCESS)
            }
            Err(err @ ExecError::Failed { .. }) => {
                eprintln!("{}", err.stderr().unwrap_or_default());
                Ok(err.exit_code().unwrap_or(exit_codes::ERROR))
            }
            Err(err) => Err(err.into()),
        };
    }

    match runner.run(&inv.inherit_stdio()) {
        Ok(_) => Ok(exit_codes::SUCCESS),
        Err(ExecError::Failed { code, .. }) => Ok(code.unwrap_or(exit_codes::ERROR)),
        Err(err) => Err(err.into()),
    }
}
