//! Single-shot protocol-specific reachability checks (§4.4) and the factory
//! that constructs them from a type tag (§4.5).

mod exec;
mod factory;
mod grpc;
mod http;
mod icmp;
mod tcp;
mod udp;

pub use factory::ProberFactory;

use crate::config::ProbeTarget;
use crate::error::ProbeError;
use std::time::{Duration, Instant};

/// §3 `ProbeResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub success: bool,
    pub latency: Duration,
    pub output: String,
    pub error: Option<ProbeError>,
}

impl ProbeResult {
    pub fn ok(latency: Duration, output: impl Into<String>) -> Self {
        Self {
            success: true,
            latency,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(latency: Duration, error: ProbeError) -> Self {
        Self {
            success: false,
            latency,
            output: String::new(),
            error: Some(error),
        }
    }
}

/// §4.4 the contract every prober variant implements. `timeout` is the
/// internal deadline the prober must enforce in addition to whatever
/// cancellation the caller applies.
pub trait Prober: Send + Sync {
    fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult;
}

/// Times an operation and folds any error into a [`ProbeResult`], the shape
/// every variant's `probe` implementation reduces to.
pub(crate) fn timed<F>(f: F) -> ProbeResult
where
    F: FnOnce() -> Result<String, ProbeError>,
{
    let start = Instant::now();
    match f() {
        Ok(output) => ProbeResult::ok(start.elapsed(), output),
        Err(error) => ProbeResult::failed(start.elapsed(), error),
    }
}

pub use exec::ExecProber;
pub use grpc::GrpcProber;
pub use http::HttpProber;
pub use icmp::IcmpProber;
pub use tcp::TcpProber;
pub use udp::UdpProber;
