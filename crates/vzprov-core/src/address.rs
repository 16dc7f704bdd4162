use crate::CoreError;
use tracing::debug;
use vzprov_runtime::HostResolver;

/// Pick the container's IP address: the explicit one if given, else the
/// first IPv4 address the hostname resolves to.
///
/// A failed lookup falls through to the "no address" error rather than
/// surfacing the resolver's error; DNS is not retried.
pub fn resolve_address(
    explicit: Option<&str>,
    hostname: Option<&str>,
    resolver: &dyn HostResolver,
) -> Result<String, CoreError> {
    if let Some(ip) = explicit_address(explicit) {
        return Ok(ip);
    }
    let Some(host) = hostname.filter(|h| !h.is_empty()) else {
        return Err(CoreError::AddressResolution(
            "no ipadd given and no hostname to resolve".to_owned(),
        ));
    };
    derived_address(host, resolver).ok_or_else(|| {
        CoreError::AddressResolution(format!(
            "no ipadd given and hostname '{host}' has no IPv4 address"
        ))
    })
}

fn explicit_address(ip: Option<&str>) -> Option<String> {
    ip.map(str::trim).filter(|ip| !ip.is_empty()).map(str::to_owned)
}

fn derived_address(host: &str, resolver: &dyn HostResolver) -> Option<String> {
    match resolver.lookup_ipv4(host) {
        Ok(addrs) => addrs.first().map(ToString::to_string),
        Err(e) => {
            debug!("address lookup fell through: {e}");
            None
        }
    }
}
