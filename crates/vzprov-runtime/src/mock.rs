use crate::executor::{BackendCommand, CommandExecutor, CommandResult};
use std::sync::Mutex;

type Effect = Box<dyn Fn(&BackendCommand) + Send + Sync>;

struct Rule {
    pattern: String,
    result: CommandResult,
    effect: Option<Effect>,
}

/// Scripted executor for tests.
///
/// Every command is recorded. The first rule whose pattern is a substring of
/// the rendered command line supplies the result; unmatched commands succeed
/// with empty output.
#[derive(Default)]
pub struct MockExecutor {
    rules: Vec<Rule>,
    issued: Mutex<Vec<BackendCommand>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on(mut self, pattern: &str, result: CommandResult) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_owned(),
            result,
            effect: None,
        });
        self
    }

    /// Like [`on`](Self::on), additionally running `effect` when the rule
    /// matches, e.g. to emulate the backend touching a config file.
    #[must_use]
    pub fn on_with<F>(mut self, pattern: &str, result: CommandResult, effect: F) -> Self
    where
        F: Fn(&BackendCommand) + Send + Sync + 'static,
    {
        self.rules.push(Rule {
            pattern: pattern.to_owned(),
            result,
            effect: Some(Box::new(effect)),
        });
        self
    }

    /// Answer the `vzlist` query with the given container IDs.
    #[must_use]
    pub fn with_listing(self, ids: &[u32]) -> Self {
        let rows: Vec<_> = ids.iter().map(|id| serde_json::json!({ "ctid": id })).collect();
        let body = serde_json::Value::Array(rows).to_string();
        self.on("vzlist", CommandResult::ok(body))
    }

    #[must_use]
    pub fn fail_on(self, pattern: &str, status: i32, stderr: &str) -> Self {
        self.on(pattern, CommandResult::failed(status, stderr))
    }

    pub fn issued(&self) -> Vec<BackendCommand> {
        self.issued
            .lock()
            .map(|cmds| cmds.clone())
            .unwrap_or_default()
    }

    /// Rendered command lines in issue order.
    pub fn commands(&self) -> Vec<String> {
        self.issued().iter().map(BackendCommand::render).collect()
    }
}

impl CommandExecutor for MockExecutor {
    fn run(&self, command: &BackendCommand) -> CommandResult {
        if let Ok(mut issued) = self.issued.lock() {
            issued.push(command.clone());
        }
        let line = command.render();
        match self.rules.iter().find(|r| line.contains(&r.pattern)) {
            Some(rule) => {
                if let Some(effect) = &rule.effect {
                    effect(command);
                }
                rule.result.clone()
            }
            None => CommandResult::ok(""),
        }
    }
}
