//! Container identifier newtype.
//!
//! Serializes as a plain integer; zero is rejected on construction and on
//! deserialization so a resolved [`Ctid`] is always a concrete positive ID.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid container id '{0}': expected a positive integer")]
pub struct InvalidCtid(pub String);

/// Numeric identifier of an OpenVZ container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Ctid(u32);

impl Ctid {
    pub fn new(id: u32) -> Result<Self, InvalidCtid> {
        if id == 0 {
            return Err(InvalidCtid(id.to_string()));
        }
        Ok(Self(id))
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// The identifier following this one, or `None` at the end of the ID space.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl TryFrom<u32> for Ctid {
    type Error = InvalidCtid;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<Ctid> for u32 {
    fn from(id: Ctid) -> Self {
        id.0
    }
}

impl FromStr for Ctid {
    type Err = InvalidCtid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = s.trim().parse().map_err(|_| InvalidCtid(s.to_owned()))?;
        Self::new(id)
    }
}

impl fmt::Display for Ctid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
