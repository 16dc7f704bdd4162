use super::{
    colorize_state, json_pretty, maybe_spinner, params_error, print_failure, spin_fail, spin_ok,
    EXIT_SUCCESS,
};
use clap::Args;
use std::path::PathBuf;
use vzprov_core::{Engine, ProvisionReport};
use vzprov_schema::{parse_spec_file, ContainerSpec, Ctid, NetifChange};

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Container hostname; also the display name and, without --ipadd, the
    /// name looked up for the address.
    pub hostname: Option<String>,
    /// Container ID. Allocated from the backend listing when omitted.
    #[arg(long)]
    pub ctid: Option<Ctid>,
    /// Display name (defaults to the hostname).
    #[arg(long)]
    pub name: Option<String>,
    /// OS template to create the private area from.
    #[arg(long)]
    pub ostemplate: Option<String>,
    /// IPv4 address (defaults to the hostname's DNS address).
    #[arg(long)]
    pub ipadd: Option<String>,
    #[arg(long)]
    pub ram: Option<String>,
    #[arg(long)]
    pub swap: Option<String>,
    #[arg(long)]
    pub diskspace: Option<String>,
    /// DNS server; repeat for several.
    #[arg(long)]
    pub nameserver: Vec<String>,
    /// DNS search domain; repeat for several.
    #[arg(long)]
    pub searchdomain: Vec<String>,
    /// Start the container when the host boots.
    #[arg(long)]
    pub onboot: Option<bool>,
    /// Bridged interface to add, e.g. `bridge=vmbr0` or `ifname=eth1,bridge=vmbr1`.
    #[arg(long)]
    pub netif: Option<NetifChange>,
    /// TOML file with container parameters; flags override its values.
    #[arg(long)]
    pub params: Option<PathBuf>,
    /// Run `vzctl create` only: no defaulting, no baseline, no network.
    #[arg(long, default_value_t = false)]
    pub no_magic: bool,
}

impl CreateArgs {
    /// Params file first, then every flag given on the command line.
    pub fn into_spec(self) -> Result<ContainerSpec, String> {
        let mut spec = match &self.params {
            Some(path) => parse_spec_file(path).map_err(|e| e.to_string())?,
            None => ContainerSpec::default(),
        };

        overlay(&mut spec.ctid, self.ctid);
        overlay(&mut spec.hostname, self.hostname);
        overlay(&mut spec.name, self.name);
        overlay(&mut spec.ostemplate, self.ostemplate);
        overlay(&mut spec.ipadd, self.ipadd);
        overlay(&mut spec.ram, self.ram);
        overlay(&mut spec.swap, self.swap);
        overlay(&mut spec.diskspace, self.diskspace);
        overlay(&mut spec.onboot, self.onboot);
        overlay(&mut spec.netif, self.netif);
        if !self.nameserver.is_empty() {
            spec.nameserver = Some(self.nameserver);
        }
        if !self.searchdomain.is_empty() {
            spec.searchdomain = Some(self.searchdomain);
        }
        Ok(spec)
    }
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

pub fn run(engine: &Engine, args: CreateArgs, json: bool) -> Result<u8, String> {
    let create_magic = !args.no_magic;
    let spec = match args.into_spec() {
        Ok(spec) => spec,
        Err(msg) => return params_error(&msg, json),
    };

    let pb = maybe_spinner(json, "provisioning container...");
    match engine.create(spec, create_magic) {
        Ok(report) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "container provisioned");
            }
            if json {
                println!("{}", json_pretty(&report)?);
            } else {
                print_human(&report);
            }
            Ok(EXIT_SUCCESS)
        }
        Err(err) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "provisioning failed");
            }
            print_failure(&err, json)
        }
    }
}

fn print_human(report: &ProvisionReport) {
    let ctid = report.ctid.map(|c| c.to_string()).unwrap_or_default();
    let state = report
        .state
        .map(|s| colorize_state(&s.to_string()))
        .unwrap_or_default();
    println!("created container {ctid} ({state})");
    if let Some(spec) = &report.spec {
        if let Some(name) = spec.display_name() {
            println!("name:   {name}");
        }
        if let Some(ip) = &spec.ipadd {
            println!("ipadd:  {ip}");
        }
    }
    if let Some(line) = &report.netif {
        println!("netif:  {line}");
    }
    for cmd in &report.commands {
        println!("  $ {}", cmd.command);
    }
}
