//! Subprocess execution
//!
//! Every external binary (`helm`, `kustomize`, `kubectl`, injectors) is run through a
//! [`CommandRunner`]. The system implementation looks the binary up on `PATH` before
//! spawning anything and turns a non-zero exit into an [`ExecError::Failed`] that still
//! carries the captured stdout.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::debug;

/// How the child's standard streams are wired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioMode {
    /// Capture stdout and stderr
    #[default]
    Capture,
    /// Inherit stdin, stdout and stderr from this process
    Inherit,
}

/// A single external command, described before it runs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Extra variables merged over the inherited environment
    pub env: BTreeMap<String, String>,
    pub current_dir: Option<PathBuf>,
    pub stdin: Option<Vec<u8>>,
    pub stdio: StdioMode,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn inherit_stdio(mut self) -> Self {
        self.stdio = StdioMode::Inherit;
        self
    }

    /// Whether the arguments start with the given tokens
    pub fn args_start_with(&self, prefix: &[&str]) -> bool {
        self.args.len() >= prefix.len() && self.args.iter().zip(prefix).all(|(a, p)| a == p)
    }

    /// Space separated command line, used for logging and error messages
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stdout with a single trailing newline removed
    pub fn stdout_trimmed(&self) -> String {
        let out = self.stdout_str();
        match out.strip_suffix('\n') {
            Some(trimmed) => trimmed.to_string(),
            None => out,
        }
    }

    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Errors from running an external command
#[derive(Debug, Error)]
pub enum ExecError {
    /// The binary is not on PATH; nothing was spawned
    #[error("executable \"{program}\" not found in PATH")]
    NotFound { program: String },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The process exited with a non-zero status
    #[error("{}", failure_message(.command, .code, .stderr))]
    Failed {
        command: String,
        code: Option<i32>,
        stdout: Vec<u8>,
        stderr: String,
    },
}

fn failure_message(command: &str, code: &Option<i32>, stderr: &str) -> String {
    if !stderr.is_empty() {
        return stderr.to_string();
    }
    match code {
        Some(code) => format!("`{command}` exited with status {code}"),
        None => format!("`{command}` was terminated by a signal"),
    }
}

impl ExecError {
    /// Exit status of a failed process, if it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecError::Failed { code, .. } => *code,
            _ => None,
        }
    }

    /// Captured stderr of a failed process
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecError::Failed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Runs external commands
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    env: BTreeMap<String, String>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable passed to every child process
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError> {
        let command = invocation.command_line();
        let program = lookup_path(&invocation.program).ok_or_else(|| ExecError::NotFound {
            program: invocation.program.clone(),
        })?;

        debug!(%command, "running");

        let mut cmd = Command::new(&program);
        cmd.args(&invocation.args)
            .envs(&self.env)
            .envs(&invocation.env);
        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }

        if invocation.stdio == StdioMode::Inherit {
            let status = cmd.status().map_err(|source| ExecError::Spawn {
                command: command.clone(),
                source,
            })?;
            if status.success() {
                return Ok(CommandOutput::default());
            }
            return Err(ExecError::Failed {
                command,
                code: status.code(),
                stdout: Vec::new(),
                stderr: String::new(),
            });
        }

        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            command: command.clone(),
            source,
        })?;

        // Feed stdin from a separate thread so a chatty child cannot block on a full stdout pipe
        let writer = match (invocation.stdin.clone(), child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                Some(std::thread::spawn(move || pipe.write_all(&input)))
            }
            _ => None,
        };

        let output = child.wait_with_output().map_err(|source| ExecError::Spawn {
            command: command.clone(),
            source,
        })?;

        if let Some(handle) = writer {
            if let Ok(Err(err)) = handle.join() {
                debug!(%command, error = %err, "stdin was not fully consumed");
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr)
                .trim_end_matches(['\n', '\r'])
                .to_string();
            return Err(ExecError::Failed {
                command,
                code: output.status.code(),
                stdout: output.stdout,
                stderr,
            });
        }

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Resolve a program name against `PATH`
///
/// Names containing a path separator are checked as-is.
pub fn lookup_path(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let full = dir.join(program);
        if full.is_file() {
            return Some(full);
        }
        let suffix = std::env::consts::EXE_SUFFIX;
        let suffixed = dir.join(format!("{program}{suffix}"));
        (!suffix.is_empty() && suffixed.is_file()).then_some(suffixed)
    })
}
