//! Codec for the `NETIF` interface descriptor.
//!
//! The descriptor is a single string of interface entries separated by `;`,
//! each entry a set of `key=value` pairs separated by `,`:
//!
//! ```text
//! ifname=eth0,mac=00:18:51:AA:BB:CC,host_ifname=veth101.0,bridge=vmbr0;ifname=eth1,...
//! ```
//!
//! Pairs split on the first `=` only, so values may contain `=`. Every entry
//! must carry an `ifname`, which becomes its key in the descriptor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const IFNAME_KEY: &str = "ifname";

const ENTRY_SEPARATOR: char = ';';
const PAIR_SEPARATOR: char = ',';
const UNSTORABLE: &[char] = &[ENTRY_SEPARATOR, PAIR_SEPARATOR, '"', '\n', '\r'];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetifError {
    #[error("attribute '{pair}' in interface entry '{entry}' has no '=' separator")]
    MissingSeparator { entry: String, pair: String },
    #[error("interface entry '{0}' has no ifname")]
    MissingIfname(String),
    #[error("interface '{0}' is declared more than once")]
    DuplicateInterface(String),
    #[error("interface change does not name an interface (ifname)")]
    UnnamedChange,
    #[error("attribute '{key}={value}' cannot be stored in a NETIF line")]
    InvalidAttribute { key: String, value: String },
}

pub type Attributes = BTreeMap<String, String>;

/// Parsed interface descriptor: interface name -> attribute map.
///
/// Each attribute map contains the `ifname` attribute equal to its key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetifDescriptor {
    interfaces: BTreeMap<String, Attributes>,
}

impl NetifDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(line: &str) -> Result<Self, NetifError> {
        let mut interfaces = BTreeMap::new();
        for entry in line.split(ENTRY_SEPARATOR) {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let attrs = parse_pairs(entry)?;
            let ifname = match attrs.get(IFNAME_KEY) {
                Some(name) if !name.is_empty() => name.clone(),
                _ => return Err(NetifError::MissingIfname(entry.to_owned())),
            };
            if interfaces.insert(ifname.clone(), attrs).is_some() {
                return Err(NetifError::DuplicateInterface(ifname));
            }
        }
        Ok(Self { interfaces })
    }

    /// Serialize back to the descriptor form. `ifname` leads each entry;
    /// interfaces and remaining attributes follow name order.
    pub fn serialize(&self) -> String {
        self.interfaces
            .iter()
            .map(|(ifname, attrs)| {
                let mut pairs = vec![format!("{IFNAME_KEY}={ifname}")];
                pairs.extend(
                    attrs
                        .iter()
                        .filter(|(k, _)| k.as_str() != IFNAME_KEY)
                        .map(|(k, v)| format!("{k}={v}")),
                );
                pairs.join(",")
            })
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn get(&self, ifname: &str) -> Option<&Attributes> {
        self.interfaces.get(ifname)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = (&str, &Attributes)> {
        self.interfaces.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Merge `change` into the entry named by the change's own `ifname`.
    ///
    /// Only the attributes present in the change are overwritten. An unknown
    /// interface name creates a new entry holding exactly the supplied
    /// attributes plus `ifname`. Other entries are never touched.
    pub fn apply(&mut self, change: &NetifChange) -> Result<(), NetifError> {
        let ifname = change
            .ifname
            .as_deref()
            .filter(|n| !n.is_empty())
            .ok_or(NetifError::UnnamedChange)?;
        change.validate()?;

        let entry = self
            .interfaces
            .entry(ifname.to_owned())
            .or_insert_with(|| BTreeMap::from([(IFNAME_KEY.to_owned(), ifname.to_owned())]));
        for (key, value) in &change.attributes {
            entry.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

impl FromStr for NetifDescriptor {
    type Err = NetifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NetifDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

/// A pair survives serialization only if it holds none of the separators,
/// the key has no `=` and neither side carries surrounding whitespace.
fn check_attribute(key: &str, value: &str) -> Result<(), NetifError> {
    let breaks_line = |s: &str| s.contains(UNSTORABLE) || s.trim() != s;
    if key.is_empty() || key.contains('=') || breaks_line(key) || breaks_line(value) {
        return Err(invalid(key, value));
    }
    Ok(())
}

fn invalid(key: &str, value: &str) -> NetifError {
    NetifError::InvalidAttribute {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}

fn parse_pairs(entry: &str) -> Result<Attributes, NetifError> {
    let mut attrs = BTreeMap::new();
    for pair in entry.split(PAIR_SEPARATOR) {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| NetifError::MissingSeparator {
                entry: entry.to_owned(),
                pair: pair.to_owned(),
            })?;
        attrs.insert(key.trim().to_owned(), value.trim().to_owned());
    }
    Ok(attrs)
}

/// A requested modification to one interface: its name plus the attributes
/// to set. The name may be left unset and filled in by the caller's defaults.
///
/// Serializes as a flat attribute map, `ifname` included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Attributes", into = "Attributes")]
pub struct NetifChange {
    pub ifname: Option<String>,
    pub attributes: Attributes,
}

impl NetifChange {
    pub fn new(ifname: impl Into<String>) -> Self {
        Self {
            ifname: Some(ifname.into()),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.attributes.insert(key.to_owned(), value.to_owned());
        self
    }

    /// Parse a single `key=value,key=value` entry. `ifname` is optional here.
    pub fn parse(entry: &str) -> Result<Self, NetifError> {
        Ok(parse_pairs(entry)?.into())
    }

    /// Check that every pair, `ifname` included, can be written into a NETIF
    /// line and read back unchanged.
    pub fn validate(&self) -> Result<(), NetifError> {
        if let Some(ifname) = &self.ifname {
            check_attribute(IFNAME_KEY, ifname)?;
        }
        for (key, value) in &self.attributes {
            if key == IFNAME_KEY {
                return Err(invalid(key, value));
            }
            check_attribute(key, value)?;
        }
        Ok(())
    }

    /// Fill in `ifname` when the request left it out. Returns the name in effect.
    pub fn default_ifname(&mut self, default: &str) -> &str {
        self.ifname.get_or_insert_with(|| default.to_owned())
    }
}

impl FromStr for NetifChange {
    type Err = NetifError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Attributes> for NetifChange {
    fn from(mut attributes: Attributes) -> Self {
        let ifname = attributes.remove(IFNAME_KEY).filter(|n| !n.is_empty());
        Self { ifname, attributes }
    }
}

impl From<NetifChange> for Attributes {
    fn from(change: NetifChange) -> Self {
        let mut attrs = change.attributes;
        if let Some(ifname) = change.ifname {
            attrs.insert(IFNAME_KEY.to_owned(), ifname);
        }
        attrs
    }
}
