use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use tracing::debug;

use crate::error::{LatencyError, Result};

/// Hosts measured by `--auto`: the busiest sites on the Internet plus a
/// spread of locations.
pub const DEFAULT_HOSTS: &[(&str, &str)] = &[
    ("Google", "google.com"),
    ("Facebook", "facebook.com"),
    ("Baidu", "baidu.com"),
    ("West Coast, USA", "speedtest.fremont.linode.com"),
    ("East Coast, USA", "speedtest.newark.linode.com"),
    ("London, UK", "speedtest.london.linode.com"),
    ("Tokyo, JP", "speedtest.tokyo.linode.com"),
    ("New Zealand", "nzdsl.co.nz"),
    ("South Africa", "speedtest.mybroadband.co.za"),
];

fn first_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|addr| match addr {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    })
}

/// Resolves a hostname or IPv4 literal to the first IPv4 address the system
/// resolver returns.
pub fn resolve_ipv4(host: &str) -> Result<Ipv4Addr> {
    if let Ok(addr) = host.parse::<Ipv4Addr>() {
        return Ok(addr);
    }

    let addrs = (host, 0)
        .to_socket_addrs()
        .map_err(|source| LatencyError::Resolution {
            host: host.to_string(),
            source,
        })?;

    let addr = first_ipv4(addrs.map(|a| a.ip()))
        .ok_or_else(|| LatencyError::NoIpv4Address(host.to_string()))?;
    debug!(host, %addr, "Resolved remote host");
    Ok(addr)
}
