use std::ffi::CStr;
use std::io;
use std::net::Ipv4Addr;

use pnet_packet::ipv4::Ipv4Packet;
use tracing::debug;

use crate::error::{LatencyError, Result};

const MIN_IPV4_HEADER_LEN: usize = 20;

/// Parses a dotted-quad IPv4 literal. Hostnames, IPv6 and CIDR suffixes are
/// rejected.
pub fn parse_ipv4(text: &str) -> Result<Ipv4Addr> {
    text.parse::<Ipv4Addr>()
        .map_err(|_| LatencyError::InvalidAddress(text.to_string()))
}

/// Splits a datagram read from a raw IPv4 socket into its source address and
/// the bytes after the IP header. Returns `None` for anything that is not a
/// well-formed IPv4 header.
pub fn strip_ipv4_header(datagram: &[u8]) -> Option<(Ipv4Addr, &[u8])> {
    let packet = Ipv4Packet::new(datagram)?;
    if packet.get_version() != 4 {
        return None;
    }
    let header_len = packet.get_header_length() as usize * 4;
    if header_len < MIN_IPV4_HEADER_LEN || header_len > datagram.len() {
        return None;
    }
    Some((packet.get_source(), &datagram[header_len..]))
}

/// An IPv4 address assigned to a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceAddr {
    pub name: String,
    pub addr: Ipv4Addr,
    pub loopback: bool,
}

/// Lists the IPv4 addresses of all local interfaces, in the order the
/// system reports them.
pub fn interface_addrs() -> Result<Vec<InterfaceAddr>> {
    let mut ifap: *mut libc::ifaddrs = std::ptr::null_mut();
    if unsafe { libc::getifaddrs(&mut ifap) } != 0 {
        return Err(LatencyError::Interface(format!(
            "getifaddrs: {}",
            io::Error::last_os_error()
        )));
    }

    let mut found = Vec::new();
    let mut cursor = ifap;
    while !cursor.is_null() {
        // SAFETY: cursor walks the list getifaddrs returned, which stays
        // valid until freeifaddrs below.
        let entry = unsafe { &*cursor };
        cursor = entry.ifa_next;

        if entry.ifa_addr.is_null() {
            continue;
        }
        let family = unsafe { (*entry.ifa_addr).sa_family } as libc::c_int;
        if family != libc::AF_INET {
            continue;
        }
        // SAFETY: AF_INET entries carry a sockaddr_in.
        let sin = unsafe { &*(entry.ifa_addr as *const libc::sockaddr_in) };
        let name = unsafe { CStr::from_ptr(entry.ifa_name) }
            .to_string_lossy()
            .into_owned();

        found.push(InterfaceAddr {
            name,
            addr: Ipv4Addr::from(u32::from_be(sin.sin_addr.s_addr)),
            loopback: entry.ifa_flags & libc::IFF_LOOPBACK as libc::c_uint != 0,
        });
    }
    unsafe { libc::freeifaddrs(ifap) };

    debug!(count = found.len(), "Enumerated IPv4 interface addresses");
    Ok(found)
}

/// Picks the named interface's first IPv4 address, or without a name the
/// first non-loopback interface that has one.
pub fn select_interface<'a>(
    addrs: &'a [InterfaceAddr],
    name: Option<&str>,
) -> Result<&'a InterfaceAddr> {
    match name {
        Some(name) => addrs
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| LatencyError::Interface(format!("{} has no IPv4 address", name))),
        None => addrs.iter().find(|a| !a.loopback).ok_or_else(|| {
            LatencyError::Interface(
                "could not decide which interface to use, specify one with -i".to_string(),
            )
        }),
    }
}

/// Local IPv4 address to probe from.
pub fn local_ipv4(interface: Option<&str>) -> Result<InterfaceAddr> {
    let addrs = interface_addrs()?;
    select_interface(&addrs, interface).cloned()
}
