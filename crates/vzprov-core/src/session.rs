use crate::interrupt::shutdown_requested;
use crate::CoreError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vzprov_runtime::{BackendCommand, CommandExecutor};

/// A backend command as issued, with what it returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCommand {
    pub command: String,
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Ordered transcript of the backend commands issued by one operation.
pub struct Session<'a> {
    executor: &'a dyn CommandExecutor,
    issued: Vec<IssuedCommand>,
}

impl<'a> Session<'a> {
    pub fn new(executor: &'a dyn CommandExecutor) -> Self {
        Self {
            executor,
            issued: Vec::new(),
        }
    }

    /// Issue a command and record it, whatever its exit status.
    pub fn query(&mut self, command: &BackendCommand) -> Result<IssuedCommand, CoreError> {
        let line = command.render();
        if shutdown_requested() {
            return Err(CoreError::Interrupted(line));
        }
        info!("issuing: {line}");
        let result = self.executor.run(command);
        debug!(status = result.status, "{line}");
        let issued = IssuedCommand {
            command: line,
            status: result.status,
            stdout: result.stdout,
            stderr: result.stderr,
        };
        self.issued.push(issued.clone());
        Ok(issued)
    }

    /// Issue a command that must succeed; non-zero exit is a backend error.
    pub fn run(&mut self, command: &BackendCommand) -> Result<IssuedCommand, CoreError> {
        let issued = self.query(command)?;
        if issued.status != 0 {
            return Err(CoreError::BackendCommand(issued));
        }
        Ok(issued)
    }

    pub fn commands(&self) -> &[IssuedCommand] {
        &self.issued
    }

    pub fn into_commands(self) -> Vec<IssuedCommand> {
        self.issued
    }
}
