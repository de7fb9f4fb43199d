//! §7 error kinds as `thiserror` enums, one per failure domain rather than a
//! single crate-wide error, matching the teacher's per-module
//! `CommandError`/`HttpClientError`/`HttpResponseError` split.

use thiserror::Error;

/// Lifecycle precondition violations (§4.3, §8 idempotence laws).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LifecycleError {
    #[error("lifecycle manager for '{0}' is already running")]
    AlreadyRunning(String),
    #[error("lifecycle manager for '{0}' is not running")]
    NotRunning(String),
}

/// Causes folded into events rather than surfaced to a caller (§7
/// propagation policy): kept as a type so an event's `error` field has
/// something richer than a bare string to carry, and so tests can match on
/// the cause without parsing a message.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FailureCause {
    #[error("process exited with code {0}")]
    ProcessFailed(i32),
    #[error("restart attempts exhausted")]
    MaxRetriesExceeded,
    #[error("health probe failed: {0}")]
    HealthProbeFailed(String),
}

/// Probe-side error kinds (§4.4, §7), shared by every `Prober` implementation.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProbeError {
    #[error("probe timed out")]
    ProbeTimeout,
    #[error("connection refused")]
    ConnectionRefused,
    #[error("probe cancelled")]
    Cancelled,
    #[error("dns resolution failed: {0}")]
    Dns(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("{0}")]
    Other(String),
}

/// Prober factory registration-side kinds (§4.5, §7).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProberFactoryError {
    #[error("unknown prober type '{0}'")]
    InvalidProberType(String),
    #[error("no factory registered for prober type '{0}'")]
    ProberFactoryMissing(String),
    #[error("probe type tag is empty")]
    EmptyProbeType,
}

/// Probe config validation kinds, consumed at construction (§7).
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ProbeConfigError {
    #[error("invalid timeout: {0:?}")]
    InvalidTimeout(std::time::Duration),
    #[error("invalid interval: {0:?}")]
    InvalidInterval(std::time::Duration),
    #[error("invalid success threshold: {0}")]
    InvalidSuccessThreshold(u32),
    #[error("invalid failure threshold: {0}")]
    InvalidFailureThreshold(u32),
}

/// Everything that can prevent a listener from being added to the probe
/// monitor (§4.6 `AddListener`, §7 "construction errors ... prevent the
/// listener from being added"): either the probe config fails validation, or
/// the factory can't build a prober for its type tag.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ListenerRegistrationError {
    #[error(transparent)]
    InvalidConfig(#[from] ProbeConfigError),
    #[error(transparent)]
    Factory(#[from] ProberFactoryError),
}
