//! ICMP reachability probe (§4.4). `native` sends a real echo request;
//! `fallback` skips straight to a TCP probe of port 443; `auto` tries native
//! first and falls back to TCP *only* when the native attempt fails with a
//! permission error (unprivileged ICMP sockets require `CAP_NET_RAW` or a
//! raw-socket-capable runtime on most platforms) — any other native failure
//! (DNS, timeout, a ping that fails for a non-permission reason) propagates
//! unchanged rather than being silently masked by a TCP fallback.
//!
//! Unlike every other prober, this one has no direct counterpart anywhere in
//! the corpus this crate is grounded on (see DESIGN.md) — `surge-ping` is
//! adopted as the ecosystem-standard async ICMP crate pairing naturally with
//! the `tokio` dependency already pulled in for the gRPC prober.

use super::{timed, Prober, ProbeResult};
use crate::config::{IcmpMode, ProbeTarget};
use crate::error::ProbeError;
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;
use tokio::runtime::Runtime;

pub struct IcmpProber {
    runtime: Runtime,
}

impl IcmpProber {
    pub fn new() -> Self {
        Self {
            runtime: tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to start icmp probe runtime"),
        }
    }
}

impl Default for IcmpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for IcmpProber {
    fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult {
        timed(|| {
            let host = host_only(&target.address)?;
            match target.icmp_mode {
                IcmpMode::Fallback => tcp_443(&host, timeout),
                IcmpMode::Native => self.runtime.block_on(native_echo(&host, timeout)),
                IcmpMode::Auto => match self.runtime.block_on(native_echo(&host, timeout)) {
                    Ok(output) => Ok(output),
                    Err(ProbeError::PermissionDenied(_)) => tcp_443(&host, timeout),
                    Err(other) => Err(other),
                },
            }
        })
    }
}

fn host_only(address: &str) -> Result<String, ProbeError> {
    address
        .rsplit_once(':')
        .map(|(host, _)| host.to_string())
        .ok_or_else(|| ProbeError::Other(format!("'{address}' is not host:port")))
}

fn tcp_443(host: &str, timeout: Duration) -> Result<String, ProbeError> {
    let addr = (host.to_string(), 443u16)
        .to_socket_addrs()
        .map_err(|err| ProbeError::Dns(err.to_string()))?
        .next()
        .ok_or_else(|| ProbeError::Dns(format!("no addresses resolved for '{host}'")))?;
    std::net::TcpStream::connect_timeout(&addr, timeout)
        .map(|_| "tcp-443 fallback reachable".to_string())
        .map_err(super::tcp::classify_connect_error)
}

async fn native_echo(host: &str, timeout: Duration) -> Result<String, ProbeError> {
    let ip: IpAddr = tokio::net::lookup_host((host, 0))
        .await
        .map_err(|err| ProbeError::Dns(err.to_string()))?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| ProbeError::Dns(format!("no addresses resolved for '{host}'")))?;

    let config = surge_ping::Config::default();
    let client = surge_ping::Client::new(&config).map_err(permission_aware_error)?;
    let payload = [0u8; 8];
    let mut pinger = client
        .pinger(ip, surge_ping::PingIdentifier(rand_identifier()))
        .await;
    pinger.timeout(timeout);

    tokio::time::timeout(
        timeout,
        pinger.ping(surge_ping::PingSequence(0), &payload),
    )
    .await
    .map_err(|_| ProbeError::ProbeTimeout)?
    .map(|(_, rtt)| format!("echo reply in {rtt:?}"))
    .map_err(|err| ProbeError::Other(err.to_string()))
}

fn permission_aware_error(err: std::io::Error) -> ProbeError {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        ProbeError::PermissionDenied(format!("opening raw socket: {err}"))
    } else {
        ProbeError::Other(err.to_string())
    }
}

fn rand_identifier() -> u16 {
    use std::time::{SystemTime, UNIX_EPOCH};
    (SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0)
        & 0xFFFF) as u16
}
