use crate::executor::BackendCommand;
use vzprov_schema::{BackendSettings, ContainerSpec, Ctid, Verb};

/// Builds `vzctl` and `vzlist` command lines for the configured binaries.
#[derive(Debug, Clone)]
pub struct VzCommands {
    vzctl: String,
    vzlist: String,
}

impl VzCommands {
    pub fn new(vzctl: impl Into<String>, vzlist: impl Into<String>) -> Self {
        Self {
            vzctl: vzctl.into(),
            vzlist: vzlist.into(),
        }
    }

    pub fn from_settings(backend: &BackendSettings) -> Self {
        Self::new(&backend.vzctl, &backend.vzlist)
    }

    fn vzctl(&self, subcommand: &str, ctid: Ctid) -> BackendCommand {
        BackendCommand::new(&self.vzctl)
            .arg(subcommand)
            .arg(ctid.to_string())
    }

    /// All containers, running or not, as JSON rows carrying only `ctid`.
    pub fn list(&self) -> BackendCommand {
        BackendCommand::new(&self.vzlist).args(["-a", "-j", "-o", "ctid"])
    }

    /// `vzctl create` with whichever creation attributes are set.
    pub fn create(&self, ctid: Ctid, spec: &ContainerSpec) -> BackendCommand {
        self.vzctl("create", ctid)
            .opt("--ostemplate", spec.ostemplate.as_deref())
            .opt("--hostname", spec.hostname.as_deref())
            .opt("--name", spec.name.as_deref())
            .opt("--ipadd", spec.ipadd.as_deref())
            .opt("--diskspace", spec.diskspace.as_deref())
    }

    /// Single persisted `vzctl set` applying the baseline resources.
    pub fn baseline(&self, ctid: Ctid, spec: &ContainerSpec) -> BackendCommand {
        let mut cmd = self
            .vzctl("set", ctid)
            .opt("--ram", spec.ram.as_deref())
            .opt("--swap", spec.swap.as_deref());
        for ns in spec.nameserver.iter().flatten() {
            cmd = cmd.arg("--nameserver").arg(ns);
        }
        for domain in spec.searchdomain.iter().flatten() {
            cmd = cmd.arg("--searchdomain").arg(domain);
        }
        cmd.opt("--onboot", spec.onboot.map(yes_no)).arg("--save")
    }

    /// Add a veth interface and let the backend pick MAC and host-side names.
    pub fn netif_add(&self, ctid: Ctid, ifname: &str) -> BackendCommand {
        self.vzctl("set", ctid)
            .arg("--netif_add")
            .arg(ifname)
            .arg("--save")
    }

    /// Single-shot pass-through: `vzctl <verb> <ctid> [args]`.
    ///
    /// `set` text is split on whitespace into flags and gains `--save` when
    /// missing; `exec`/`exec2` text is one argument run by the container shell.
    pub fn verb(&self, verb: Verb, ctid: Ctid, args: Option<&str>) -> BackendCommand {
        let cmd = self.vzctl(verb.as_str(), ctid);
        let args = args.map(str::trim).filter(|a| !a.is_empty());
        match verb {
            Verb::Set => {
                let words: Vec<&str> = args
                    .map(|a| a.split_whitespace().collect())
                    .unwrap_or_default();
                let save = !words.contains(&"--save");
                let cmd = cmd.args(words);
                if save {
                    cmd.arg("--save")
                } else {
                    cmd
                }
            }
            Verb::Exec | Verb::Exec2 => match args {
                Some(text) => cmd.arg(text),
                None => cmd,
            },
            _ => match args {
                Some(text) => cmd.args(text.split_whitespace()),
                None => cmd,
            },
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
