//! UDP reachability probe (§4.4). Intrinsically weak: a send that doesn't
//! error plus a best-effort short read counts as success. §9 keeps this
//! semantics rather than requiring a server-side echo, noting it as a known
//! limitation rather than a bug.

use super::{timed, Prober, ProbeResult};
use crate::config::ProbeTarget;
use crate::error::ProbeError;
use std::net::UdpSocket;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct UdpProber;

impl UdpProber {
    pub fn new() -> Self {
        Self
    }
}

impl Prober for UdpProber {
    fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult {
        timed(|| {
            let addr = super::tcp::resolve(&target.address)?;
            let socket = UdpSocket::bind(("0.0.0.0", 0))
                .map_err(|err| ProbeError::Other(err.to_string()))?;
            socket
                .connect(addr)
                .map_err(super::tcp::classify_connect_error)?;
            socket
                .send(&[])
                .map_err(|err| ProbeError::Other(err.to_string()))?;

            socket
                .set_read_timeout(Some(timeout.min(Duration::from_millis(200))))
                .map_err(|err| ProbeError::Other(err.to_string()))?;
            let mut buf = [0u8; 64];
            match socket.recv(&mut buf) {
                Ok(_) | Err(_) => Ok("sent".to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_send_with_no_listener_on_the_other_end_still_succeeds() {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        drop(socket);

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

        let result = UdpProber::new().probe(&target, Duration::from_millis(100));
        assert!(result.success, "UDP probing treats any send as success");
    }
}
