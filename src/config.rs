use std::net::Ipv4Addr;
use std::time::Duration;

use clap::Parser;
use tracing::debug;

use crate::error::{LatencyError, Result};
use crate::net::ip::parse_ipv4;

pub const DEFAULT_PORT: u16 = 80;

#[derive(Parser, Debug, Clone)]
#[command(name = "latency")]
#[command(about = "Measure round-trip latency with a raw TCP SYN (needs root)")]
pub struct Config {
    /// IP address or host name to measure
    pub remote: Option<String>,

    /// Interface to send from (e.g. eth0, wlan1)
    #[arg(short, long)]
    pub interface: Option<String>,

    /// Local IPv4 address to send from, overrides --interface
    #[arg(short, long)]
    pub local: Option<String>,

    /// Port to test against
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Measure latency to several well known addresses
    #[arg(short, long)]
    pub auto: bool,

    /// Accept replies from any host, not just the remote
    #[arg(long)]
    pub no_filter: bool,

    /// Give up waiting for a reply after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Config {
    pub fn read_timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn filter_remote(&self) -> bool {
        !self.no_filter
    }

    /// The explicit `--local` address, if one was given.
    pub fn local_addr(&self) -> Result<Option<Ipv4Addr>> {
        self.local.as_deref().map(parse_ipv4).transpose()
    }

    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");
        match (&self.remote, self.auto) {
            (None, false) => return Err(LatencyError::Config("missing remote address".into())),
            (Some(_), true) => {
                return Err(LatencyError::Config(
                    "a remote address cannot be combined with --auto".into(),
                ))
            }
            _ => {}
        }
        if self.timeout_ms == Some(0) {
            return Err(LatencyError::Config("timeout must be > 0".into()));
        }
        self.local_addr()?;
        debug!("Configuration validated successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("latency").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let config = parse(&["example.com"]);
        assert_eq!(config.remote.as_deref(), Some("example.com"));
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.filter_remote());
        assert_eq!(config.read_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn short_flags() {
        let config = parse(&["-i", "eth0", "-p", "443", "10.0.0.1"]);
        assert_eq!(config.interface.as_deref(), Some("eth0"));
        assert_eq!(config.port, 443);
    }

    #[test]
    fn auto_needs_no_remote() {
        let config = parse(&["-a"]);
        assert!(config.validate().is_ok());
        assert!(parse(&["-a", "example.com"]).validate().is_err());
    }

    #[test]
    fn missing_remote_is_rejected() {
        assert!(matches!(parse(&[]).validate(), Err(LatencyError::Config(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = parse(&["--timeout-ms", "0", "example.com"]);
        assert!(config.validate().is_err());
        let config = parse(&["--timeout-ms", "250", "example.com"]);
        assert_eq!(config.read_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn local_must_be_dotted_quad() {
        let config = parse(&["-l", "192.168.1.30/24", "example.com"]);
        assert!(matches!(config.validate(), Err(LatencyError::InvalidAddress(_))));

        let config = parse(&["-l", "192.168.1.30", "--no-filter", "example.com"]);
        assert_eq!(config.local_addr().unwrap(), Some(Ipv4Addr::new(192, 168, 1, 30)));
        assert!(!config.filter_remote());
    }

    #[test]
    fn out_of_range_port_fails_to_parse() {
        assert!(Config::try_parse_from(["latency", "-p", "70000", "example.com"]).is_err());
    }
}
