use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command;
use tracing::{debug, trace};

/// Exit status reported when the backend program could not be spawned at all.
pub const SPAWN_FAILURE_STATUS: i32 = 127;

pub fn shell_quote(s: &str) -> String {
    // Single-quoting in POSIX shell: replace ' with '\'' then wrap in '
    if !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@,+".contains(c))
    {
        return s.to_owned();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// One backend invocation: a program and its argument vector.
///
/// Arguments are passed to the program as-is; [`fmt::Display`] renders the
/// command as a shell-quoted line for logs and reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl BackendCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append `flag value` when `value` is present.
    #[must_use]
    pub fn opt(self, flag: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.arg(flag).arg(v),
            None => self,
        }
    }

    pub fn render(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for BackendCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[inline]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs backend commands to completion.
///
/// Implementations never fail: a command that cannot be started is reported
/// as a non-zero [`CommandResult`], and callers interpret exit codes.
pub trait CommandExecutor: Send + Sync {
    fn run(&self, command: &BackendCommand) -> CommandResult;
}

/// Spawns backend commands as child processes and waits for them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessExecutor;

impl ProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for ProcessExecutor {
    fn run(&self, command: &BackendCommand) -> CommandResult {
        debug!("running: {command}");
        match Command::new(&command.program).args(&command.args).output() {
            Ok(output) => {
                let result = CommandResult {
                    // A signal-terminated child has no exit code.
                    status: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                trace!(status = result.status, "finished: {command}");
                result
            }
            Err(e) => CommandResult::failed(
                SPAWN_FAILURE_STATUS,
                format!("failed to execute {}: {e}", command.program),
            ),
        }
    }
}
