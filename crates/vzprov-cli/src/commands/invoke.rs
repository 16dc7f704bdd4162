use super::{json_pretty, params_error, print_failure, success_json, EXIT_SUCCESS};
use std::io::Read;
use std::path::Path;
use vzprov_core::Engine;
use vzprov_schema::Invocation;

/// Run one JSON named-parameter invocation. The result is always JSON on
/// stdout, whatever `--json` says.
pub fn run(engine: &Engine, source: &Path) -> Result<u8, String> {
    let input = match read_source(source) {
        Ok(input) => input,
        Err(msg) => return params_error(&msg, true),
    };
    let invocation = match Invocation::from_json(&input) {
        Ok(invocation) => invocation,
        Err(e) => return params_error(&e.to_string(), true),
    };

    match engine.invoke(&invocation) {
        Ok(report) => {
            println!("{}", json_pretty(&success_json(&report))?);
            Ok(EXIT_SUCCESS)
        }
        Err(err) => print_failure(&err, true),
    }
}

fn read_source(source: &Path) -> Result<String, String> {
    if source == Path::new("-") {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| format!("failed to read invocation parameters from stdin: {e}"))?;
        return Ok(input);
    }
    std::fs::read_to_string(source).map_err(|e| {
        format!(
            "failed to read invocation parameters from {}: {e}",
            source.display()
        )
    })
}
