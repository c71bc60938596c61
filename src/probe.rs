use std::net::Ipv4Addr;
use std::time::Instant;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::{LatencyError, Result};
use crate::latency::Clock;
use crate::net::checksum::tcp_checksum;
use crate::net::socket::OutboundSocket;
use crate::net::tcp::TcpHeader;

/// Source port stamped on every probe. Nothing listens on it; it only marks
/// the segment as ours in captures.
pub const PROBE_SOURCE_PORT: u16 = 0xaa47;
/// Advertised receive window on probes.
pub const PROBE_WINDOW: u16 = 0xaaaa;

/// One probe that left this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRecord {
    pub local: Ipv4Addr,
    pub remote: Ipv4Addr,
    pub port: u16,
    pub sequence_number: u32,
    /// Taken immediately before the write.
    pub sent_at: Instant,
}

/// Serialized SYN with its checksum filled in for the given address pair.
pub fn build_syn(local: Ipv4Addr, remote: Ipv4Addr, port: u16, sequence_number: u32) -> Vec<u8> {
    let mut header = TcpHeader::syn(PROBE_SOURCE_PORT, port, sequence_number, PROBE_WINDOW);
    header.checksum = tcp_checksum(&header.encode(), local, remote);
    header.encode()
}

/// Writes one SYN on `socket` and returns when it left. The socket is
/// consumed and closed before returning.
pub fn send_probe<S: OutboundSocket>(
    mut socket: S,
    clock: &dyn Clock,
    local: Ipv4Addr,
    remote: Ipv4Addr,
    port: u16,
) -> Result<ProbeRecord> {
    let sequence_number = rand::thread_rng().gen();
    let segment = build_syn(local, remote, port, sequence_number);

    let sent_at = clock.now();
    let written = socket.send(&segment).map_err(|e| {
        warn!(error = %e, %remote, "Failed to send probe");
        LatencyError::Transmission(e)
    })?;
    drop(socket);

    if written != segment.len() {
        return Err(LatencyError::ShortWrite {
            written,
            expected: segment.len(),
        });
    }

    debug!(%local, %remote, port, sequence_number, "Probe sent");
    Ok(ProbeRecord {
        local,
        remote,
        port,
        sequence_number,
        sent_at,
    })
}
