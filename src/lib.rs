//! # procwatch
//!
//! A process supervisor: launches long-running child processes from a
//! declarative [`config::ServiceConfig`], restarts them per policy with
//! exponential backoff and a stability-reset window ([`restart`]), and
//! correlates their liveness with out-of-band health probes against their
//! network listeners ([`probe`], [`monitor`]).
//!
//! Configuration loading/parsing, service discovery, system metrics
//! collection, log formatting/rotation, and the CLI/daemon bootstrap are
//! external collaborators and are not implemented by this crate.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod executor;
pub mod lifecycle;
pub mod monitor;
pub mod probe;
pub mod restart;
pub mod supervisor;
pub mod types;
mod util;

pub use clock::{Clock, SystemClock};
pub use config::{ListenerConfig, ProbeConfig, RestartConfig, RestartPolicy, ServiceConfig};
pub use error::{
    FailureCause, LifecycleError, ListenerRegistrationError, ProbeConfigError, ProbeError,
    ProberFactoryError,
};
pub use event::{Event, EventKind, ProbeEvent, ProcessState, Status};
pub use executor::{IdentityError, OsProcessExecutor, ProcessExecutor};
pub use lifecycle::LifecycleManager;
pub use monitor::{LivenessCallback, ProbeMonitor};
pub use probe::{Prober, ProberFactory, ProbeResult};
pub use restart::RestartTracker;
pub use supervisor::Supervisor;
