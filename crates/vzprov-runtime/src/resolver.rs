use crate::RuntimeError;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};
use tracing::trace;

/// Forward lookup of IPv4 addresses for a hostname.
pub trait HostResolver: Send + Sync {
    fn lookup_ipv4(&self, host: &str) -> Result<Vec<Ipv4Addr>, RuntimeError>;
}

/// Resolver backed by the host's name service (`getaddrinfo`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn lookup_ipv4(&self, host: &str) -> Result<Vec<Ipv4Addr>, RuntimeError> {
        let addrs = (host, 0)
            .to_socket_addrs()
            .map_err(|source| RuntimeError::Lookup {
                host: host.to_owned(),
                source,
            })?;
        let v4: Vec<Ipv4Addr> = addrs
            .filter_map(|a| match a.ip() {
                IpAddr::V4(ip) => Some(ip),
                IpAddr::V6(_) => None,
            })
            .collect();
        trace!("{host} resolved to {v4:?}");
        Ok(v4)
    }
}

/// Fixed hostname table, for tests and offline runs.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    table: HashMap<String, Vec<Ipv4Addr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, host: &str, addr: Ipv4Addr) -> Self {
        self.table.entry(host.to_owned()).or_default().push(addr);
        self
    }
}

impl HostResolver for StaticResolver {
    fn lookup_ipv4(&self, host: &str) -> Result<Vec<Ipv4Addr>, RuntimeError> {
        self.table
            .get(host)
            .cloned()
            .ok_or_else(|| RuntimeError::Lookup {
                host: host.to_owned(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "unknown host"),
            })
    }
}
