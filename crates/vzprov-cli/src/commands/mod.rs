pub mod completions;
pub mod create;
pub mod destroy;
pub mod doctor;
pub mod invoke;
pub mod list;
pub mod man_pages;
pub mod netif;
pub mod verb;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use vzprov_core::{CoreError, ProvisionError, ProvisionReport};

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_PARAMS_ERROR: u8 = 2;
pub const EXIT_CONFIG_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn finish(pb: &ProgressBar, msg: String) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(msg);
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    finish(pb, format!("✗ {msg}"));
}

/// Spinner for human output only; `--json` keeps stdout machine-readable.
pub fn maybe_spinner(json: bool, msg: &str) -> Option<ProgressBar> {
    if json {
        None
    } else {
        Some(spinner(msg))
    }
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "done" => Style::new().green().apply_to(state).to_string(),
        "failed" => Style::new().red().bold().apply_to(state).to_string(),
        "aborted_early" => Style::new().yellow().apply_to(state).to_string(),
        "created" | "baseline_configured" | "network_reconciled" => {
            Style::new().cyan().apply_to(state).to_string()
        }
        other => other.to_owned(),
    }
}

/// Exit code for a failed operation: bad parameters, a damaged or
/// unwritable container config, or anything else. An allocation that failed
/// because `vzlist` did is a backend failure, not a parameter error.
pub fn exit_code(error: &CoreError) -> u8 {
    match error {
        CoreError::Allocation { command: Some(_), .. } => EXIT_FAILURE,
        e if e.is_validation() => EXIT_PARAMS_ERROR,
        CoreError::Parse { .. } | CoreError::Reconcile { .. } | CoreError::Write { .. } => {
            EXIT_CONFIG_ERROR
        }
        _ => EXIT_FAILURE,
    }
}

/// Structured failure for automation callers.
pub fn failure_json(err: &ProvisionError) -> serde_json::Value {
    serde_json::json!({
        "failed": true,
        "msg": err.to_string(),
        "state": err.state,
        "commands": err.commands,
        "stdout": err.stdout(),
        "stderr": err.stderr(),
        "cmd": err.failed_command().map(|c| c.command.as_str()),
        "rc": err.failed_command().map(|c| c.status),
    })
}

/// Structured success for automation callers.
pub fn success_json(report: &ProvisionReport) -> serde_json::Value {
    serde_json::json!({
        "changed": report.changed,
        "ctid": report.ctid,
        "state": report.state,
        "commands": report.commands,
        "stdout": report.stdout(),
        "stderr": report.stderr(),
        "netif": report.netif,
    })
}

/// Report unusable command parameters (unreadable or malformed input) and
/// return the parameter-error exit code.
pub fn params_error(msg: &str, json: bool) -> Result<u8, String> {
    if json {
        let payload = serde_json::json!({ "failed": true, "msg": msg });
        println!("{}", json_pretty(&payload)?);
    } else {
        eprintln!("error: {msg}");
    }
    Ok(EXIT_PARAMS_ERROR)
}

/// Print a failed operation and return its exit code.
pub fn print_failure(err: &ProvisionError, json: bool) -> Result<u8, String> {
    if json {
        println!("{}", json_pretty(&failure_json(err))?);
    } else {
        eprintln!("error: {err}");
        if let Some(state) = err.state {
            eprintln!("stopped in state {}", colorize_state(&state.to_string()));
        }
        if let Some(cmd) = err.failed_command() {
            eprintln!("command: {} (exit {})", cmd.command, cmd.status);
            if !cmd.stdout.trim().is_empty() {
                eprintln!("{}", cmd.stdout.trim_end());
            }
        }
    }
    Ok(exit_code(&err.error))
}

/// Print the backend output of a successful operation, one block per command.
pub fn print_command_output(report: &ProvisionReport) {
    for cmd in &report.commands {
        let out = cmd.stdout.trim_end();
        if !out.is_empty() {
            println!("{out}");
        }
        let err = cmd.stderr.trim_end();
        if !err.is_empty() {
            eprintln!("{err}");
        }
    }
}
