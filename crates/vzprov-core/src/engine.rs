use crate::address::resolve_address;
use crate::allocator::allocate;
use crate::lifecycle::{validate_transition, ProvisionState};
use crate::netconf::{reconcile, ContainerConf, Reconciled};
use crate::session::{IssuedCommand, Session};
use crate::CoreError;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use vzprov_runtime::{
    parse_listing, CommandExecutor, HostResolver, ProcessExecutor, SystemResolver, VzCommands,
};
use vzprov_schema::{ContainerSpec, Ctid, Invocation, NetifChange, Settings, Verb};

/// Drives container provisioning and single-shot verbs through a
/// [`CommandExecutor`].
///
/// The engine keeps no state between calls; each operation gets its own
/// command transcript, returned in the report or the error.
pub struct Engine {
    settings: Settings,
    commands: VzCommands,
    executor: Arc<dyn CommandExecutor>,
    resolver: Arc<dyn HostResolver>,
}

/// Outcome of a successful operation.
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    /// `create`, a pass-through verb name, `netif` or `list`.
    pub operation: String,
    pub changed: bool,
    pub ctid: Option<Ctid>,
    /// Final lifecycle state; only provisioning runs have one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ProvisionState>,
    pub commands: Vec<IssuedCommand>,
    /// The spec as sent to the backend, after defaulting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<ContainerSpec>,
    /// The NETIF line written, when the network step ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netif: Option<String>,
    pub started_at: String,
    pub finished_at: String,
}

impl ProvisionReport {
    fn new(operation: &str, started_at: String) -> Self {
        Self {
            operation: operation.to_owned(),
            changed: false,
            ctid: None,
            state: None,
            commands: Vec::new(),
            spec: None,
            netif: None,
            started_at,
            finished_at: timestamp(),
        }
    }

    pub fn stdout(&self) -> String {
        join_output(&self.commands, |c| c.stdout.as_str())
    }

    pub fn stderr(&self) -> String {
        join_output(&self.commands, |c| c.stderr.as_str())
    }
}

/// A failed operation: the error, where the lifecycle stopped, and every
/// command issued up to and including the failing one.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct ProvisionError {
    #[source]
    pub error: CoreError,
    pub state: Option<ProvisionState>,
    pub commands: Vec<IssuedCommand>,
}

impl ProvisionError {
    fn bare(error: CoreError, commands: Vec<IssuedCommand>) -> Self {
        Self {
            error,
            state: None,
            commands,
        }
    }

    /// The command that failed, or the last one issued.
    pub fn failed_command(&self) -> Option<&IssuedCommand> {
        self.error.command().or(self.commands.last())
    }

    pub fn stdout(&self) -> String {
        join_output(&self.commands, |c| c.stdout.as_str())
    }

    pub fn stderr(&self) -> String {
        join_output(&self.commands, |c| c.stderr.as_str())
    }
}

fn join_output<'a>(
    commands: &'a [IssuedCommand],
    pick: fn(&'a IssuedCommand) -> &'a str,
) -> String {
    commands
        .iter()
        .map(pick)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Lifecycle cursor for one provisioning run.
struct Progress {
    state: ProvisionState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: ProvisionState::Start,
        }
    }

    fn advance(&mut self, to: ProvisionState) -> Result<(), CoreError> {
        validate_transition(self.state, to)?;
        info!("provisioning: {} -> {to}", self.state);
        self.state = to;
        Ok(())
    }

    /// Terminal state for `error`: validation failures before the backend
    /// was asked to create anything abort early, everything else fails.
    fn fail(self, error: &CoreError) -> ProvisionState {
        let to = if error.is_validation() && self.state.before_create() {
            ProvisionState::AbortedEarly
        } else {
            ProvisionState::Failed
        };
        match validate_transition(self.state, to) {
            Ok(()) => to,
            Err(_) => self.state,
        }
    }
}

impl Engine {
    pub fn new(
        settings: Settings,
        executor: Arc<dyn CommandExecutor>,
        resolver: Arc<dyn HostResolver>,
    ) -> Self {
        let commands = VzCommands::from_settings(&settings.backend);
        Self {
            settings,
            commands,
            executor,
            resolver,
        }
    }

    /// Engine running real backend processes and resolving through the host.
    pub fn with_system(settings: Settings) -> Self {
        Self::new(
            settings,
            Arc::new(ProcessExecutor::new()),
            Arc::new(SystemResolver),
        )
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one named-parameter invocation.
    pub fn invoke(&self, invocation: &Invocation) -> Result<ProvisionReport, ProvisionError> {
        match invocation.command {
            Verb::Create => self.create(invocation.spec(), invocation.create_magic),
            verb @ (Verb::Destroy
            | Verb::Mount
            | Verb::Unmount
            | Verb::Stop
            | Verb::Restart
            | Verb::Status
            | Verb::Start
            | Verb::Set
            | Verb::Exec
            | Verb::Exec2) => self.pass_through(verb, invocation.ctid, invocation.args.as_deref()),
        }
    }

    /// Provision a container.
    ///
    /// With `create_magic` the spec is completed first (ID, address, name,
    /// default table) and the container is configured after creation;
    /// without it an explicit ID is required and only `vzctl create` runs.
    pub fn create(
        &self,
        mut spec: ContainerSpec,
        create_magic: bool,
    ) -> Result<ProvisionReport, ProvisionError> {
        let started_at = timestamp();
        let mut session = Session::new(self.executor.as_ref());
        let mut progress = Progress::new();

        let outcome = self.run_create(&mut session, &mut progress, &mut spec, create_magic);
        let commands = session.into_commands();
        match outcome {
            Ok(reconciled) => {
                info!(
                    "provisioned container {} with {} command(s)",
                    spec.ctid.map(|id| id.to_string()).unwrap_or_default(),
                    commands.len()
                );
                Ok(ProvisionReport {
                    changed: true,
                    ctid: spec.ctid,
                    state: Some(progress.state),
                    commands,
                    netif: reconciled.map(|r| r.line),
                    spec: Some(spec),
                    ..ProvisionReport::new("create", started_at)
                })
            }
            Err(error) => {
                let state = progress.fail(&error);
                warn!("provisioning stopped in state {state}: {error}");
                Err(ProvisionError {
                    error,
                    state: Some(state),
                    commands,
                })
            }
        }
    }

    fn run_create(
        &self,
        session: &mut Session<'_>,
        progress: &mut Progress,
        spec: &mut ContainerSpec,
        create_magic: bool,
    ) -> Result<Option<Reconciled>, CoreError> {
        if create_magic {
            self.complete_spec(session, spec)?;
        }
        progress.advance(ProvisionState::Defaulted)?;

        let Some(ctid) = spec.ctid else {
            return Err(CoreError::Validation(
                "a container ID is required when defaulting is disabled".to_owned(),
            ));
        };
        if create_magic {
            if let Some(change) = &spec.netif {
                if !matches!(change.ifname.as_deref(), Some(name) if !name.is_empty()) {
                    return Err(CoreError::Validation(
                        "network change names no interface and no default ifname is configured"
                            .to_owned(),
                    ));
                }
                change
                    .validate()
                    .map_err(|e| CoreError::Validation(e.to_string()))?;
            }
        }

        session.run(&self.commands.create(ctid, spec))?;
        progress.advance(ProvisionState::Created)?;
        if !create_magic {
            progress.advance(ProvisionState::Done)?;
            return Ok(None);
        }

        session.run(&self.commands.baseline(ctid, spec))?;
        progress.advance(ProvisionState::BaselineConfigured)?;

        let reconciled = match &spec.netif {
            Some(change) => {
                let ifname = change.ifname.as_deref().unwrap_or_default();
                session.run(&self.commands.netif_add(ctid, ifname))?;
                let conf = ContainerConf::new(self.settings.conf_path(ctid));
                let reconciled = reconcile(&conf, change)?;
                progress.advance(ProvisionState::NetworkReconciled)?;
                Some(reconciled)
            }
            None => None,
        };

        progress.advance(ProvisionState::Done)?;
        Ok(reconciled)
    }

    /// Allocate the ID, pick the address or interface name, default the
    /// display name, then fill the rest from the default table.
    fn complete_spec(
        &self,
        session: &mut Session<'_>,
        spec: &mut ContainerSpec,
    ) -> Result<(), CoreError> {
        let defaults = &self.settings.defaults;

        let ctid = allocate(spec.ctid, || self.query_listing(session))?;
        spec.ctid = Some(ctid);

        match spec.netif.as_mut() {
            None => {
                let ip = resolve_address(
                    spec.ipadd.as_deref(),
                    spec.hostname.as_deref(),
                    self.resolver.as_ref(),
                )?;
                spec.ipadd = Some(ip);
            }
            Some(change) => {
                change.default_ifname(&defaults.ifname);
            }
        }

        if spec.name.is_none() {
            spec.name.clone_from(&spec.hostname);
        }
        spec.apply_defaults(defaults);
        Ok(())
    }

    fn query_listing(&self, session: &mut Session<'_>) -> Result<Vec<Ctid>, CoreError> {
        let issued = session.query(&self.commands.list())?;
        if issued.status != 0 {
            return Err(CoreError::Allocation {
                reason: format!(
                    "`{}` exited with status {}: {}",
                    issued.command,
                    issued.status,
                    issued.stderr.trim()
                ),
                command: Some(issued),
            });
        }
        parse_listing(&issued.stdout).map_err(|e| CoreError::Allocation {
            reason: e.to_string(),
            command: Some(issued),
        })
    }

    /// Run one `vzctl <verb> <ctid> [args]` and report it verbatim.
    pub fn pass_through(
        &self,
        verb: Verb,
        ctid: Option<Ctid>,
        args: Option<&str>,
    ) -> Result<ProvisionReport, ProvisionError> {
        let started_at = timestamp();
        let mut session = Session::new(self.executor.as_ref());

        let outcome = match (verb, ctid) {
            (Verb::Create, _) => Err(CoreError::Validation(
                "create is a provisioning run, not a single-shot verb".to_owned(),
            )),
            (_, None) => Err(CoreError::Validation(format!(
                "{verb} requires a container ID"
            ))),
            (_, Some(ctid)) => session.run(&self.commands.verb(verb, ctid, args)).map(|_| ()),
        };

        let commands = session.into_commands();
        match outcome {
            Ok(()) => Ok(ProvisionReport {
                changed: verb.mutates(),
                ctid,
                commands,
                ..ProvisionReport::new(verb.as_str(), started_at)
            }),
            Err(error) => Err(ProvisionError::bare(error, commands)),
        }
    }

    /// Merge `change` into an existing container's NETIF line.
    ///
    /// Only the configuration file is touched; no backend command is issued.
    pub fn apply_netif(
        &self,
        ctid: Ctid,
        mut change: NetifChange,
    ) -> Result<ProvisionReport, ProvisionError> {
        let started_at = timestamp();
        let ifname = change.default_ifname(&self.settings.defaults.ifname);
        if ifname.is_empty() {
            return Err(ProvisionError::bare(
                CoreError::Validation("network change names no interface".to_owned()),
                Vec::new(),
            ));
        }

        let conf = ContainerConf::new(self.settings.conf_path(ctid));
        let reconciled =
            reconcile(&conf, &change).map_err(|e| ProvisionError::bare(e, Vec::new()))?;
        Ok(ProvisionReport {
            changed: reconciled.changed(),
            ctid: Some(ctid),
            netif: Some(reconciled.line),
            ..ProvisionReport::new("netif", started_at)
        })
    }

    /// IDs of every container known to the backend.
    pub fn list(&self) -> Result<Vec<Ctid>, ProvisionError> {
        let mut session = Session::new(self.executor.as_ref());
        let outcome = self.query_listing(&mut session);
        let commands = session.into_commands();
        outcome.map_err(|e| ProvisionError::bare(e, commands))
    }
}
