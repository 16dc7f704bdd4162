use crate::netif::NetifChange;
use crate::settings::Defaults;
use crate::types::Ctid;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read params file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse params file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

/// Desired state of one container. Unset fields are either left to the
/// backend or filled from the [`Defaults`] table when defaulting is enabled.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContainerSpec {
    #[serde(default)]
    pub ctid: Option<Ctid>,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Display name; defaults to the hostname.
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
}

impl ContainerSpec {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: Some(hostname.to_owned()),
            ..Self::default()
        }
    }

    /// Fill every unset attribute from the default table. Values already
    /// set are never overwritten.
    pub fn apply_defaults(&mut self, defaults: &Defaults) {
        fill(&mut self.ostemplate, &defaults.ostemplate);
        fill(&mut self.ram, &defaults.ram);
        fill(&mut self.swap, &defaults.swap);
        fill(&mut self.diskspace, &defaults.diskspace);
        self.nameserver
            .get_or_insert_with(|| defaults.nameserver.clone());
        self.searchdomain
            .get_or_insert_with(|| defaults.searchdomain.clone());
        self.onboot.get_or_insert(defaults.onboot);
    }

    /// Display name in effect: explicit name, else hostname.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.hostname.as_deref())
    }
}

fn fill(slot: &mut Option<String>, default: &str) {
    if slot.is_none() {
        *slot = Some(default.to_owned());
    }
}

/// Accept either a single whitespace-separated string or a list of strings.
pub(crate) fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(
        Option::<OneOrMany>::deserialize(deserializer)?.map(|v| match v {
            OneOrMany::One(s) => s.split_whitespace().map(str::to_owned).collect(),
            OneOrMany::Many(v) => v,
        }),
    )
}

pub fn parse_spec_str(input: &str) -> Result<ContainerSpec, SpecError> {
    Ok(toml::from_str(input)?)
}

pub fn parse_spec_file(path: impl AsRef<Path>) -> Result<ContainerSpec, SpecError> {
    let content = fs::read_to_string(path)?;
    parse_spec_str(&content)
}
