use super::{verb, EXIT_PARAMS_ERROR};
use dialoguer::Confirm;
use std::io::{stderr, stdin, IsTerminal};
use vzprov_core::Engine;
use vzprov_schema::{Ctid, Verb};

pub fn run(engine: &Engine, ctid: Ctid, yes: bool, json: bool) -> Result<u8, String> {
    let is_tty = stdin().is_terminal() && stderr().is_terminal();
    if !confirmed(ctid, yes, is_tty && !json)? {
        eprintln!("refusing to destroy container {ctid} without confirmation (pass --yes)");
        return Ok(EXIT_PARAMS_ERROR);
    }
    verb::run(engine, Verb::Destroy, ctid, None, json)
}

fn confirmed(ctid: Ctid, yes: bool, interactive: bool) -> Result<bool, String> {
    if yes {
        return Ok(true);
    }
    if !interactive {
        return Ok(false);
    }
    Confirm::new()
        .with_prompt(format!("destroy container {ctid} and its private area?"))
        .default(false)
        .interact()
        .map_err(|e| format!("prompt failed: {e}"))
}
