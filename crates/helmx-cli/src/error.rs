//! CLI error type
//!
//! Library errors are wrapped with a diagnostic code and, where there is something the user
//! can do about it, a help line.

use helmx_chartify::ChartifyError;
use helmx_core::ExecError;
use helmx_release::ReleaseError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    /// Invalid options, rejected before anything ran
    #[error("invalid options")]
    #[diagnostic(code(helmx::cli::config))]
    Config {
        source: ChartifyError,
        #[help]
        help: Option<String>,
    },

    /// A chartify stage failed
    #[error("failed to build the chart")]
    #[diagnostic(code(helmx::cli::chartify))]
    Chartify { source: ChartifyError },

    #[error("failed to access the release record")]
    #[diagnostic(code(helmx::cli::release))]
    Release { source: ReleaseError },

    /// An external command failed or could not be started
    #[error("external command failed")]
    #[diagnostic(code(helmx::cli::exec))]
    Exec {
        source: ExecError,
        #[help]
        help: Option<String>,
    },

    #[error("IO error: {message}")]
    #[diagnostic(code(helmx::cli::io))]
    Io { message: String },
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        exit_codes::ERROR
    }
}

fn exec_help(err: &ExecError) -> Option<String> {
    match err {
        ExecError::NotFound { program } => Some(format!(
            "install {program} or point HELM_BIN, KUBECTL_BIN or KUSTOMIZE_BIN at it"
        )),
        _ => None,
    }
}

impl From<ExecError> for CliError {
    fn from(source: ExecError) -> Self {
        let help = exec_help(&source);
        CliError::Exec { source, help }
    }
}

impl From<ChartifyError> for CliError {
    fn from(source: ChartifyError) -> Self {
        match source {
            ChartifyError::Exec(err) => err.into(),
            err if err.is_configuration() => {
                let help = match &err {
                    ChartifyError::SetWithKustomization => {
                        Some("move the values into a file passed with -f/--values".to_string())
                    }
                    ChartifyError::MissingVersion => {
                        Some("pass --version with a semver version such as 1.0.0".to_string())
                    }
                    _ => None,
                };
                CliError::Config { source: err, help }
            }
            err => CliError::Chartify { source: err },
        }
    }
}

impl From<ReleaseError> for CliError {
    fn from(source: ReleaseError) -> Self {
        match source {
            ReleaseError::Exec(err) => err.into(),
            err => CliError::Release { source: err },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
