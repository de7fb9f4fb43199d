//! TCP reachability probe (§4.4): connect, then close. Failure is connection
//! refusal or the internal deadline expiring.

use super::{timed, Prober, ProbeResult};
use crate::config::ProbeTarget;
use crate::error::ProbeError;
use std::net::TcpStream;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        Self
    }
}

impl Prober for TcpProber {
    fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult {
        timed(|| {
            let addr = resolve(&target.address)?;
            TcpStream::connect_timeout(&addr, timeout)
                .map(|_| "connected".to_string())
                .map_err(classify_connect_error)
        })
    }
}

pub(crate) fn resolve(address: &str) -> Result<std::net::SocketAddr, ProbeError> {
    use std::net::ToSocketAddrs;
    address
        .to_socket_addrs()
        .map_err(|err| ProbeError::Dns(err.to_string()))?
        .next()
        .ok_or_else(|| ProbeError::Dns(format!("no addresses resolved for '{address}'")))
}

pub(crate) fn classify_connect_error(err: std::io::Error) -> ProbeError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::ConnectionRefused => ProbeError::ConnectionRefused,
        ErrorKind::TimedOut | ErrorKind::WouldBlock => ProbeError::ProbeTimeout,
        _ => ProbeError::Other(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn succeeds_against_a_listening_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let target = ProbeTarget {
            service_name: "svc".to_string(),
            listener_name: "main".to_string(),
            address: addr.to_string(),
            http_path: "/".to_string(),
            http_method: "GET".to_string(),
            http_expected_status: 200,
            grpc_service: String::new(),
            exec_command: String::new(),
            exec_args: vec![],
            icmp_mode: crate::config::IcmpMode::Auto,
        };

        let result = TcpProber::new().probe(&target, Duration::from_millis(500));
        assert!(result.success);
    }

    #[test]
    fn fails_against_a_closed_port() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = ProbeTarget {
            service_name: "svc".to_string(),
            listener_name: "main".to_string(),
            address: addr.to_string(),
            http_path: "/".to_string(),
            http_method: "GET".to_string(),
            http_expected_status: 200,
            grpc_service: String::new(),
            exec_command: String::new(),
            exec_args: vec![],
            icmp_mode: crate::config::IcmpMode::Auto,
        };

        let result = TcpProber::new().probe(&target, Duration::from_millis(500));
        assert!(!result.success);
    }
}
