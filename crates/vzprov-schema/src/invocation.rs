//! Named parameters passed in by an automation framework.
//!
//! One invocation names a verb, the container fields, and optional free-form
//! argument text for pass-through verbs.

use crate::netif::NetifChange;
use crate::spec::{one_or_many, ContainerSpec};
use crate::types::Ctid;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("failed to parse invocation parameters: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown command '{0}'")]
    UnknownVerb(String),
}

/// Backend verb. `Create` is the only multi-step operation; every other
/// verb maps to a single `vzctl <verb> <ctid>` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Create,
    Destroy,
    Mount,
    #[serde(alias = "umount")]
    Unmount,
    Stop,
    Restart,
    Status,
    Start,
    Set,
    Exec,
    Exec2,
}

impl Verb {
    pub const ALL: [Verb; 11] = [
        Verb::Create,
        Verb::Destroy,
        Verb::Mount,
        Verb::Unmount,
        Verb::Stop,
        Verb::Restart,
        Verb::Status,
        Verb::Start,
        Verb::Set,
        Verb::Exec,
        Verb::Exec2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Destroy => "destroy",
            Verb::Mount => "mount",
            Verb::Unmount => "umount",
            Verb::Stop => "stop",
            Verb::Restart => "restart",
            Verb::Status => "status",
            Verb::Start => "start",
            Verb::Set => "set",
            Verb::Exec => "exec",
            Verb::Exec2 => "exec2",
        }
    }

    /// Whether a successful run of this verb alters container state.
    pub fn mutates(self) -> bool {
        !matches!(self, Verb::Status)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = InvocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unmount" | "umount" => Ok(Verb::Unmount),
            other => Verb::ALL
                .into_iter()
                .find(|v| v.as_str() == other)
                .ok_or_else(|| InvocationError::UnknownVerb(other.to_owned())),
        }
    }
}

fn default_create_magic() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Invocation {
    pub command: Verb,
    #[serde(default)]
    pub ctid: Option<Ctid>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ostemplate: Option<String>,
    #[serde(default)]
    pub ipadd: Option<String>,
    #[serde(default)]
    pub ram: Option<String>,
    #[serde(default)]
    pub swap: Option<String>,
    #[serde(default)]
    pub diskspace: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub nameserver: Option<Vec<String>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub searchdomain: Option<Vec<String>>,
    #[serde(default)]
    pub onboot: Option<bool>,
    #[serde(default)]
    pub netif: Option<NetifChange>,
    /// Enables defaulting and the multi-step create sequence.
    #[serde(default = "default_create_magic")]
    pub create_magic: bool,
    /// Free-form argument text for `set`, `exec` and `exec2`.
    #[serde(default)]
    pub args: Option<String>,
}

impl Invocation {
    pub fn from_json(input: &str) -> Result<Self, InvocationError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn spec(&self) -> ContainerSpec {
        ContainerSpec {
            ctid: self.ctid,
            hostname: self.hostname.clone(),
            name: self.name.clone(),
            ostemplate: self.ostemplate.clone(),
            ipadd: self.ipadd.clone(),
            ram: self.ram.clone(),
            swap: self.swap.clone(),
            diskspace: self.diskspace.clone(),
            nameserver: self.nameserver.clone(),
            searchdomain: self.searchdomain.clone(),
            onboot: self.onboot,
            netif: self.netif.clone(),
        }
    }
}
