use std::fmt;
use std::path::Path;
use std::process::Command;
use vzprov_schema::BackendSettings;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

fn command_exists(name: &str) -> bool {
    if name.contains('/') {
        return Path::new(name).is_file();
    }
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Check the backend tools and configuration directory named in settings.
/// Returns a list of missing items. Empty list means all prerequisites are met.
pub fn check_backend_prereqs(backend: &BackendSettings) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();

    if !command_exists(&backend.vzctl) {
        missing.push(MissingPrereq {
            name: backend.vzctl.clone(),
            purpose: "container creation and control",
            install_hint: "yum install vzctl | apt install vzctl, or set backend.vzctl",
        });
    }

    if !command_exists(&backend.vzlist) {
        missing.push(MissingPrereq {
            name: backend.vzlist.clone(),
            purpose: "listing existing containers for ID allocation",
            install_hint: "shipped with vzctl, or set backend.vzlist",
        });
    }

    if !backend.conf_dir.is_dir() {
        missing.push(MissingPrereq {
            name: backend.conf_dir.display().to_string(),
            purpose: "container configuration files (NETIF reconciliation)",
            install_hint: "install an OpenVZ kernel and vzctl, or set backend.conf_dir",
        });
    }

    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nvzprov drives the OpenVZ tools and needs them installed on this host.");
    msg
}
