use std::net::Ipv4Addr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::warn;

use tcp_latency::net::ip::local_ipv4;
use tcp_latency::targets::{resolve_ipv4, DEFAULT_HOSTS};
use tcp_latency::{init_logging, measure, Config, ProbeTarget, RawNetwork, SystemClock};

fn local_address(config: &Config) -> anyhow::Result<Ipv4Addr> {
    if let Some(local) = config.local_addr()? {
        return Ok(local);
    }
    let iface = local_ipv4(config.interface.as_deref())
        .context("could not determine the local address")?;
    Ok(iface.addr)
}

fn latency_to(
    network: &RawNetwork,
    config: &Config,
    local: Ipv4Addr,
    host: &str,
) -> anyhow::Result<std::time::Duration> {
    let remote = resolve_ipv4(host)?;
    let target = ProbeTarget {
        local,
        remote,
        port: config.port,
        filter_remote: config.filter_remote(),
    };
    let measurement = measure(network, Arc::new(SystemClock), &target)
        .with_context(|| format!("measuring latency to {}", host))?;
    Ok(measurement.latency)
}

fn auto_test(network: &RawNetwork, config: &Config, local: Ipv4Addr) {
    for (name, host) in DEFAULT_HOSTS {
        match latency_to(network, config, local, host) {
            Ok(latency) => println!("{:>15}: {:?}", name, latency),
            Err(e) => {
                warn!(host, error = %e, "Measurement failed");
                println!("{:>15}: error: {:#}", name, e);
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_logging(&config.log_level);
    config.validate()?;

    let local = local_address(&config)?;
    let network = RawNetwork::new(config.read_timeout());

    if config.auto {
        auto_test(&network, &config, local);
        return Ok(());
    }

    let remote_host = config.remote.as_deref().unwrap_or_default();
    println!(
        "Measuring round-trip latency from {} to {} on port {}",
        local, remote_host, config.port
    );
    let latency = latency_to(&network, &config, local, remote_host)?;
    println!("Latency: {:?}", latency);
    Ok(())
}
