//! Round-trip latency measurement with a hand-built TCP SYN.
//!
//! A SYN is written on a raw IPv4 socket while a second raw socket waits for
//! the peer's RST or SYN+ACK. No handshake is completed. Raw sockets need
//! root (or `CAP_NET_RAW`).

pub mod config;
pub mod error;
pub mod hextools;
pub mod latency;
pub mod listener;
pub mod logging;
pub mod net;
pub mod probe;
pub mod targets;

pub use config::Config;
pub use error::{LatencyError, Result};
pub use latency::{measure, Clock, Measurement, ProbeTarget, SystemClock};
pub use logging::init_logging;
pub use net::socket::RawNetwork;
