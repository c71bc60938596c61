//! Ties the listener and the sender together into one measurement.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{LatencyError, Result};
use crate::listener::{Reply, ReplyListener};
use crate::net::socket::{InboundSocket, Network};
use crate::probe::{send_probe, ProbeRecord};

/// Source of timestamps for both ends of a measurement.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Everything one measurement needs, already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTarget {
    pub local: Ipv4Addr,
    pub remote: Ipv4Addr,
    pub port: u16,
    /// Only accept replies whose source is `remote`.
    pub filter_remote: bool,
}

#[derive(Debug, Clone)]
pub struct Measurement {
    pub probe: ProbeRecord,
    pub reply: Reply,
    pub latency: Duration,
}

/// Measures one round trip: bind the listener, send the SYN, wait for the
/// RST or SYN+ACK and subtract the two timestamps.
///
/// The listening socket is bound before its thread starts, so it is ready
/// by the time the probe leaves. Without a read timeout on the network the
/// call blocks until a reply arrives. If the probe cannot be sent, the
/// listener is cancelled and joined before the send error is returned.
pub fn measure<N: Network>(
    network: &N,
    clock: Arc<dyn Clock>,
    target: &ProbeTarget,
) -> Result<Measurement> {
    debug!(local = %target.local, remote = %target.remote, port = target.port, "Opening listener");

    let inbound = network.open_inbound(target.local, Arc::clone(&clock))?;
    let canceller = inbound
        .canceller()
        .map_err(|e| LatencyError::Socket { op: "clone", source: e })?;
    let filter = target.filter_remote.then_some(target.remote);
    let listener = ReplyListener::new(inbound, filter);
    let listening = thread::spawn(move || listener.wait_for_reply());

    debug!(filter = ?filter, "Listening, sending SYN");

    let sent = network
        .open_outbound(target.local, target.remote)
        .and_then(|outbound| {
            send_probe(
                outbound,
                clock.as_ref(),
                target.local,
                target.remote,
                target.port,
            )
        });
    let probe = match sent {
        Ok(probe) => probe,
        Err(e) => {
            canceller.cancel();
            if let Ok(Err(listen_err)) = listening.join() {
                debug!(error = %listen_err, "Listener stopped after send failure");
            }
            return Err(e);
        }
    };

    let reply = listening
        .join()
        .map_err(|_| LatencyError::ListenerPanicked)??;

    // Instants are monotonic; a reply stamped before the send can only be
    // unrelated traffic and reports as zero.
    let latency = reply.received_at.saturating_duration_since(probe.sent_at);
    debug!(latency_us = latency.as_micros() as u64, "Measurement complete");

    Ok(Measurement {
        probe,
        reply,
        latency,
    })
}
