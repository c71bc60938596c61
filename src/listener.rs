use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::error::{LatencyError, Result};
use crate::net::socket::InboundSocket;
use crate::net::tcp::{TcpFlags, TcpHeader};

/// The segment that ended a measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub source: Ipv4Addr,
    pub source_port: u16,
    pub flags: TcpFlags,
    /// Taken by the socket as soon as the datagram was read.
    pub received_at: Instant,
}

/// A closed port answers a SYN with RST, an open one with SYN+ACK.
pub fn answers_syn(header: &TcpHeader) -> bool {
    header.has_flag(TcpFlags::RST)
        || (header.has_flag(TcpFlags::SYN) && header.has_flag(TcpFlags::ACK))
}

/// Waits on an already bound socket for the first RST or SYN+ACK.
///
/// Matching is by flags and, when `remote_filter` is set, by source address
/// only. Ports and sequence numbers are not compared, so unrelated traffic
/// from the same peer that carries those flags is taken as the reply.
pub struct ReplyListener<S> {
    socket: S,
    remote_filter: Option<Ipv4Addr>,
}

impl<S: InboundSocket> ReplyListener<S> {
    pub fn new(socket: S, remote_filter: Option<Ipv4Addr>) -> Self {
        Self {
            socket,
            remote_filter,
        }
    }

    /// Reads until a reply shows up. Any read error ends the wait; the socket
    /// is dropped on every exit path.
    pub fn wait_for_reply(mut self) -> Result<Reply> {
        loop {
            let datagram = self.socket.recv().map_err(|e| match e.kind() {
                ErrorKind::WouldBlock | ErrorKind::TimedOut => LatencyError::Timeout,
                _ => {
                    warn!(error = %e, "Failed to read from listening socket");
                    LatencyError::Receive(e)
                }
            })?;

            if let Some(remote) = self.remote_filter {
                if datagram.source != remote {
                    trace!(source = %datagram.source, "Ignoring segment from another host");
                    continue;
                }
            }

            let header = match TcpHeader::decode(&datagram.segment) {
                Ok(header) => header,
                Err(e) => {
                    debug!(source = %datagram.source, error = %e, "Ignoring malformed segment");
                    continue;
                }
            };

            if answers_syn(&header) {
                debug!(
                    source = %datagram.source,
                    source_port = header.source_port,
                    flags = header.flags.bits(),
                    "Reply received"
                );
                return Ok(Reply {
                    source: datagram.source,
                    source_port: header.source_port,
                    flags: header.flags,
                    received_at: datagram.received_at,
                });
            }

            trace!(flags = header.flags.bits(), "Ignoring segment that does not answer a SYN");
        }
    }
}
