//! Injectors
//!
//! An injector is an external command that reads a manifest file and prints the replacement
//! on stdout. Every file goes through every injector in declaration order, so the second
//! injector sees the output of the first.

use std::fs;
use std::path::PathBuf;

use helmx_core::Invocation;
use tracing::{debug, info};

use crate::error::{ChartifyError, Result};
use crate::pipeline::Pipeline;

/// Token replaced by the manifest path
pub const FILE_PLACEHOLDER: &str = "FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injector {
    argv: Vec<String>,
}

impl Injector {
    /// A command template such as `istioctl kube-inject -f FILE`
    pub fn from_template(template: &str) -> Result<Self> {
        let argv: Vec<String> = template.split_whitespace().map(String::from).collect();
        if argv.is_empty() {
            return Err(ChartifyError::EmptyInjector);
        }
        Ok(Self { argv })
    }

    /// A legacy descriptor: `"<cmd> [sub],key=value,..."`
    ///
    /// Single-letter keys become `-k`, longer ones `--key`. A bare token is passed through.
    pub fn from_legacy(descriptor: &str) -> Result<Self> {
        let mut tokens = descriptor.split(',');
        let mut argv: Vec<String> = tokens
            .next()
            .unwrap_or_default()
            .split_whitespace()
            .map(String::from)
            .collect();
        if argv.is_empty() {
            return Err(ChartifyError::EmptyInjector);
        }

        for flag in tokens {
            let parts: Vec<&str> = flag.split('=').collect();
            match parts.as_slice() {
                [bare] => argv.push(bare.to_string()),
                [key, value] => {
                    let dashes = if key.chars().count() == 1 { "-" } else { "--" };
                    argv.push(format!("{dashes}{key}"));
                    if !value.is_empty() {
                        argv.push(value.to_string());
                    }
                }
                _ => {
                    return Err(ChartifyError::InvalidInjectorFlag {
                        flag: flag.to_string(),
                    });
                }
            }
        }

        Ok(Self { argv })
    }

    /// Legacy descriptors first, then templates
    pub fn parse_all(legacy: &[String], templates: &[String]) -> Result<Vec<Self>> {
        legacy
            .iter()
            .map(|d| Self::from_legacy(d))
            .chain(templates.iter().map(|t| Self::from_template(t)))
            .collect()
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The command for one file; only the first `FILE` token is substituted
    pub fn invocation(&self, file: &str) -> Invocation {
        let mut argv = self.argv.clone();
        if let Some(slot) = argv.iter_mut().find(|arg| arg.contains(FILE_PLACEHOLDER)) {
            *slot = slot.replacen(FILE_PLACEHOLDER, file, 1);
        }
        Invocation::new(argv[0].clone()).args(argv.into_iter().skip(1))
    }
}

impl Pipeline<'_> {
    /// Rewrite every file with the output of each injector in turn
    pub fn inject(&self, files: &[PathBuf], injectors: &[Injector]) -> Result<()> {
        if injectors.is_empty() {
            return Ok(());
        }
        info!(files = files.len(), injectors = injectors.len(), "running injectors");

        for file in files {
            let path = file.to_string_lossy();
            for injector in injectors {
                let invocation = injector.invocation(&path);
                debug!(command = %invocation, "injecting");
                let out = self.runner().run(&invocation)?;
                fs::write(file, out.stdout)?;
            }
        }
        Ok(())
    }
}
