use super::{json_pretty, print_command_output, print_failure, success_json, EXIT_SUCCESS};
use vzprov_core::Engine;
use vzprov_runtime::shell_quote;
use vzprov_schema::{Ctid, Verb};

/// Run one pass-through verb and echo the backend's output.
pub fn run(
    engine: &Engine,
    verb: Verb,
    ctid: Ctid,
    args: Option<&str>,
    json: bool,
) -> Result<u8, String> {
    match engine.pass_through(verb, Some(ctid), args) {
        Ok(report) => {
            if json {
                println!("{}", json_pretty(&success_json(&report))?);
            } else {
                print_command_output(&report);
                if let Some(done) = past_tense(verb) {
                    println!("{done} container {ctid}");
                }
            }
            Ok(EXIT_SUCCESS)
        }
        Err(err) => print_failure(&err, json),
    }
}

fn past_tense(verb: Verb) -> Option<&'static str> {
    match verb {
        Verb::Create => Some("created"),
        Verb::Destroy => Some("destroyed"),
        Verb::Mount => Some("mounted"),
        Verb::Unmount => Some("unmounted"),
        Verb::Stop => Some("stopped"),
        Verb::Restart => Some("restarted"),
        Verb::Start => Some("started"),
        Verb::Set => Some("updated"),
        Verb::Status | Verb::Exec | Verb::Exec2 => None,
    }
}

/// Argument words joined back into the free-form text the engine expects.
pub fn join_args(words: &[String]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Command words for `exec`/`exec2`, shell-quoted so the container shell
/// sees the same argument boundaries.
pub fn join_command(words: &[String]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(
            words
                .iter()
                .map(|w| shell_quote(w))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}
