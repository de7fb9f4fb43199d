//! §4.5 `ProberFactory::Create(typeTag, timeout) -> (Prober, error)`.

use super::{ExecProber, GrpcProber, HttpProber, IcmpProber, Prober, TcpProber, UdpProber};
use crate::error::ProberFactoryError;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ProberFactory;

impl ProberFactory {
    pub fn new() -> Self {
        Self
    }

    /// `timeout` is accepted for symmetry with §4.5's signature; each
    /// variant receives its effective timeout per-call from the monitor
    /// scheduler instead of baking it in at construction, since a prober
    /// instance is reused across every tick of its listener's schedule.
    pub fn create(
        &self,
        type_tag: &str,
        _timeout: Duration,
    ) -> Result<Box<dyn Prober>, ProberFactoryError> {
        match type_tag {
            "" => Err(ProberFactoryError::EmptyProbeType),
            "tcp" => Ok(Box::new(TcpProber::new())),
            "udp" => Ok(Box::new(UdpProber::new())),
            "http" => Ok(Box::new(HttpProber::new())),
            "grpc" => Ok(Box::new(GrpcProber::new())),
            "icmp" => Ok(Box::new(IcmpProber::new())),
            "exec" => Ok(Box::new(ExecProber::new())),
            other => Err(ProberFactoryError::InvalidProberType(other.to_string())),
        }
    }
}
