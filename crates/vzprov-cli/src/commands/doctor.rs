use super::{EXIT_FAILURE, EXIT_SUCCESS};
use vzprov_core::Engine;
use vzprov_schema::Settings;

pub fn run(engine: &Engine, json_output: bool) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    let prereqs_ok = check_prereqs(engine.settings(), &mut checks, &mut all_pass);
    check_root(&mut checks);
    check_defaults(engine.settings(), &mut checks, &mut all_pass);
    if prereqs_ok {
        check_listing(engine, &mut checks, &mut all_pass);
    }

    print_results(&checks, all_pass, json_output)
}

fn check_prereqs(settings: &Settings, checks: &mut Vec<Check>, all_pass: &mut bool) -> bool {
    let missing = vzprov_runtime::check_backend_prereqs(&settings.backend);
    if missing.is_empty() {
        checks.push(Check::pass(
            "backend_prereqs",
            &format!(
                "Backend tools found ({}, {}), config dir {}",
                settings.backend.vzctl,
                settings.backend.vzlist,
                settings.backend.conf_dir.display()
            ),
        ));
        true
    } else {
        *all_pass = false;
        checks.push(Check::fail(
            "backend_prereqs",
            &vzprov_runtime::format_missing(&missing),
        ));
        false
    }
}

fn check_root(checks: &mut Vec<Check>) {
    // SAFETY: geteuid has no preconditions and cannot fail.
    #[allow(unsafe_code)]
    let euid = unsafe { libc::geteuid() };
    if euid == 0 {
        checks.push(Check::pass("root", "Running as root"));
    } else {
        checks.push(Check::warn(
            "root",
            &format!("Running as uid {euid}; vzctl needs root to change containers"),
        ));
    }
}

fn check_defaults(settings: &Settings, checks: &mut Vec<Check>, all_pass: &mut bool) {
    let defaults = &settings.defaults;
    if defaults.ifname.is_empty() {
        *all_pass = false;
        checks.push(Check::fail(
            "defaults",
            "defaults.ifname is empty; network changes without ifname will be rejected",
        ));
    } else {
        checks.push(Check::info(
            "defaults",
            &format!(
                "Defaults: template {}, ram {}, swap {}, disk {}, ifname {}",
                defaults.ostemplate, defaults.ram, defaults.swap, defaults.diskspace, defaults.ifname
            ),
        ));
    }
}

fn check_listing(engine: &Engine, checks: &mut Vec<Check>, all_pass: &mut bool) {
    match engine.list() {
        Ok(ids) => checks.push(Check::pass(
            "listing",
            &format!("Container listing works ({} containers)", ids.len()),
        )),
        Err(e) => {
            *all_pass = false;
            checks.push(Check::fail(
                "listing",
                &format!("Container listing failed: {e}"),
            ));
        }
    }
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("vzprov doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: &'static str,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &'static str, status: &'static str, message: &str) -> Self {
        Self {
            name,
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &'static str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &'static str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &'static str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &'static str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
