use std::io::{self, ErrorKind, Read};
use std::net::{Ipv4Addr, Shutdown, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tracing::{debug, trace, warn};

use crate::error::{LatencyError, Result};
use crate::hextools::HexDump;
use crate::latency::Clock;
use crate::net::ip::strip_ipv4_header;

/// Large enough for any IPv4 datagram.
const RECV_BUFFER_SIZE: usize = 65535;

/// A TCP segment as it arrived, IP header removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundDatagram {
    pub source: Ipv4Addr,
    pub segment: Vec<u8>,
    /// Taken as soon as the read returned.
    pub received_at: Instant,
}

/// Unblocks a pending [`InboundSocket::recv`] from another thread.
pub struct ReadCanceller(Box<dyn FnOnce() + Send>);

impl ReadCanceller {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(cancel))
    }

    pub fn cancel(self) {
        (self.0)()
    }
}

/// Write side of a probe: one socket, one segment.
pub trait OutboundSocket {
    fn send(&mut self, segment: &[u8]) -> io::Result<usize>;
}

/// Read side: yields every inbound TCP segment addressed to the local host.
pub trait InboundSocket {
    fn recv(&mut self) -> io::Result<InboundDatagram>;

    /// Once cancelled, a blocked or later `recv` fails instead of waiting.
    fn canceller(&self) -> io::Result<ReadCanceller>;
}

/// Opens the sockets a measurement needs.
pub trait Network {
    type Outbound: OutboundSocket;
    type Inbound: InboundSocket + Send + 'static;

    fn open_outbound(&self, local: Ipv4Addr, remote: Ipv4Addr) -> Result<Self::Outbound>;
    /// `clock` stamps every datagram the returned socket reads.
    fn open_inbound(&self, local: Ipv4Addr, clock: Arc<dyn Clock>) -> Result<Self::Inbound>;
}

/// Raw IPv4 sockets scoped to the TCP protocol number. The kernel writes the
/// IP header on send; on receive it is handed to us and stripped here.
#[derive(Debug, Clone, Default)]
pub struct RawNetwork {
    read_timeout: Option<Duration>,
}

impl RawNetwork {
    pub fn new(read_timeout: Option<Duration>) -> Self {
        Self { read_timeout }
    }
}

fn raw_tcp_socket() -> Result<Socket> {
    Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::TCP)).map_err(|e| {
        warn!(error = %e, "Failed to open raw socket (are you root?)");
        LatencyError::Socket { op: "open", source: e }
    })
}

fn sock_addr(addr: Ipv4Addr) -> SockAddr {
    SockAddr::from(SocketAddr::new(addr.into(), 0))
}

impl Network for RawNetwork {
    type Outbound = RawOutbound;
    type Inbound = RawInbound;

    fn open_outbound(&self, local: Ipv4Addr, remote: Ipv4Addr) -> Result<RawOutbound> {
        let socket = raw_tcp_socket()?;
        // Pin the source so it matches the address in the pseudo-header.
        socket
            .bind(&sock_addr(local))
            .map_err(|e| LatencyError::Socket { op: "bind", source: e })?;
        socket
            .connect(&sock_addr(remote))
            .map_err(|e| LatencyError::Socket { op: "connect", source: e })?;
        debug!(%local, %remote, "Opened outbound raw socket");
        Ok(RawOutbound { socket })
    }

    fn open_inbound(&self, local: Ipv4Addr, clock: Arc<dyn Clock>) -> Result<RawInbound> {
        let socket = raw_tcp_socket()?;
        socket
            .bind(&sock_addr(local))
            .map_err(|e| LatencyError::Socket { op: "bind", source: e })?;
        if let Some(timeout) = self.read_timeout {
            socket
                .set_read_timeout(Some(timeout))
                .map_err(|e| LatencyError::Socket { op: "configure", source: e })?;
        }
        debug!(%local, timeout = ?self.read_timeout, "Listening on raw socket");
        Ok(RawInbound {
            socket,
            buffer: vec![0u8; RECV_BUFFER_SIZE],
            clock,
        })
    }
}

#[derive(Debug)]
pub struct RawOutbound {
    socket: Socket,
}

impl OutboundSocket for RawOutbound {
    fn send(&mut self, segment: &[u8]) -> io::Result<usize> {
        trace!("Sending segment\n{}", HexDump(segment));
        self.socket.send(segment)
    }
}

pub struct RawInbound {
    socket: Socket,
    buffer: Vec<u8>,
    clock: Arc<dyn Clock>,
}

impl InboundSocket for RawInbound {
    fn recv(&mut self) -> io::Result<InboundDatagram> {
        loop {
            let len = self.socket.read(&mut self.buffer)?;
            let received_at = self.clock.now();
            if len == 0 {
                // Raw datagrams are never empty: the read side was shut down.
                return Err(io::Error::new(
                    ErrorKind::ConnectionAborted,
                    "listening socket shut down",
                ));
            }

            let datagram = &self.buffer[..len];
            match strip_ipv4_header(datagram) {
                Some((source, segment)) => {
                    trace!(%source, "Received segment\n{}", HexDump(segment));
                    return Ok(InboundDatagram {
                        source,
                        segment: segment.to_vec(),
                        received_at,
                    });
                }
                None => debug!(len, "Dropping datagram without a valid IPv4 header"),
            }
        }
    }

    fn canceller(&self) -> io::Result<ReadCanceller> {
        let handle = self.socket.try_clone()?;
        Ok(ReadCanceller::new(move || {
            // Linux answers ENOTCONN on an unconnected raw socket but still
            // marks the read side shut and wakes the blocked reader.
            if let Err(e) = handle.shutdown(Shutdown::Read) {
                debug!(error = %e, "shutdown on listening socket");
            }
        }))
    }
}
