//! Scripted [`CommandRunner`] for tests
//!
//! Handlers are keyed by program name and an argument prefix; the longest matching
//! prefix wins. Every invocation is recorded, matched or not.

use std::cell::RefCell;

use crate::exec::{CommandOutput, CommandRunner, ExecError, Invocation};

type Handler = Box<dyn Fn(&Invocation) -> Result<CommandOutput, ExecError>>;

struct Route {
    program: String,
    prefix: Vec<String>,
    handler: Handler,
}

#[derive(Default)]
pub struct FakeRunner {
    routes: Vec<Route>,
    calls: RefCell<Vec<Invocation>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer invocations of `program` whose arguments start with `prefix`
    pub fn on<F>(mut self, program: &str, prefix: &[&str], handler: F) -> Self
    where
        F: Fn(&Invocation) -> Result<CommandOutput, ExecError> + 'static,
    {
        self.routes.push(Route {
            program: program.to_string(),
            prefix: prefix.iter().map(|s| s.to_string()).collect(),
            handler: Box::new(handler),
        });
        self
    }

    /// Answer with a fixed stdout
    pub fn stdout(self, program: &str, prefix: &[&str], stdout: &str) -> Self {
        let stdout = stdout.to_string();
        self.on(program, prefix, move |_| Ok(CommandOutput::new(stdout.clone())))
    }

    /// Answer with a non-zero exit
    pub fn fail(self, program: &str, prefix: &[&str], code: i32, stderr: &str) -> Self {
        let stderr = stderr.to_string();
        self.on(program, prefix, move |inv| Err(failure(inv, code, &stderr)))
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(Invocation::command_line).collect()
    }
}

/// Build the error a real process exiting with `code` would produce
pub fn failure(invocation: &Invocation, code: i32, stderr: &str) -> ExecError {
    ExecError::Failed {
        command: invocation.command_line(),
        code: Some(code),
        stdout: Vec::new(),
        stderr: stderr.to_string(),
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, invocation: &Invocation) -> Result<CommandOutput, ExecError> {
        self.calls.borrow_mut().push(invocation.clone());

        let route = self
            .routes
            .iter()
            .filter(|route| {
                let prefix: Vec<&str> = route.prefix.iter().map(String::as_str).collect();
                route.program == invocation.program && invocation.args_start_with(&prefix)
            })
            .max_by_key(|route| route.prefix.len());

        match route {
            Some(route) => (route.handler)(invocation),
            None => Err(failure(
                invocation,
                127,
                &format!("no fake registered for `{invocation}`"),
            )),
        }
    }
}
