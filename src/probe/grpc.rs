//! gRPC reachability probe (§4.4): calls the standard gRPC health-checking
//! protocol (`grpc.health.v1.Health/Check`) against `target.address` for
//! `target.grpc_service` (empty meaning overall server health).
//!
//! Every other prober in this module is synchronous, matching the
//! thread-per-listener scheduling model in §5. `tonic`'s client is async
//! only, so this prober keeps a small single-threaded Tokio runtime purely
//! to `block_on` the client call, the same way a synchronous caller would
//! use a blocking FFI wrapper around an async library it doesn't otherwise
//! need.

use super::{timed, Prober, ProbeResult};
use crate::config::ProbeTarget;
use crate::error::ProbeError;
use std::time::Duration;
use tokio::runtime::Runtime;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;
use tonic_health::ServingStatus;

pub struct GrpcProber {
    runtime: Runtime,
}

impl GrpcProber {
    pub fn new() -> Self {
        Self {
            runtime: tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to start grpc probe runtime"),
        }
    }
}

impl Default for GrpcProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for GrpcProber {
    fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult {
        timed(|| {
            self.runtime
                .block_on(check(target.address.clone(), target.grpc_service.clone(), timeout))
        })
    }
}

async fn check(address: String, service: String, timeout: Duration) -> Result<String, ProbeError> {
    let endpoint = tonic::transport::Endpoint::from_shared(format!("http://{address}"))
        .map_err(|err| ProbeError::Other(err.to_string()))?
        .timeout(timeout)
        .connect_timeout(timeout);

    let channel = tokio::time::timeout(timeout, endpoint.connect())
        .await
        .map_err(|_| ProbeError::ProbeTimeout)?
        .map_err(|_| ProbeError::ConnectionRefused)?;

    let mut client = HealthClient::new(channel);
    let response = tokio::time::timeout(
        timeout,
        client.check(HealthCheckRequest {
            service: service.clone(),
        }),
    )
    .await
    .map_err(|_| ProbeError::ProbeTimeout)?
    .map_err(|err| ProbeError::Other(err.to_string()))?;

    match response.into_inner().status() {
        ServingStatus::Serving => Ok(format!("service '{service}' serving")),
        other => Err(ProbeError::Other(format!("status {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_endpoint_fails_fast() {
        let prober = GrpcProber::new();
        let target = ProbeTarget {
            service_name: "svc".to_string(),
            listener_name: "grpc".to_string(),
            address: "127.0.0.1:1".to_string(),
            http_path: "/".to_string(),
            http_method: "GET".to_string(),
            http_expected_status: 200,
            grpc_service: String::new(),
            exec_command: String::new(),
            exec_args: vec![],
            icmp_mode: crate::config::IcmpMode::Auto,
        };

        let result = prober.probe(&target, Duration::from_millis(200));
        assert!(!result.success);
    }
}
