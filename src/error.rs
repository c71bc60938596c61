use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LatencyError {
    #[error("error resolving {host}: {source}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("{0} has no IPv4 address (latency works with IPv4 addresses only)")]
    NoIpv4Address(String),

    #[error("invalid IPv4 address {0:?}")]
    InvalidAddress(String),

    #[error("interface error: {0}")]
    Interface(String),

    #[error("failed to {op} raw socket: {source}")]
    Socket {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {0}")]
    Transmission(#[source] io::Error),

    #[error("short write, wrote {written}/{expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("read failed: {0}")]
    Receive(#[source] io::Error),

    #[error("no reply before the read timeout expired")]
    Timeout,

    #[error("reply listener panicked")]
    ListenerPanicked,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LatencyError>;
