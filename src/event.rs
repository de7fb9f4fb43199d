//! Shared event and process-state vocabulary (§3, §4.7), the counterpart to
//! the teacher's `event.rs` (`OpAMPEvent`/`ApplicationEvent`/...): one tagged
//! enum per concern instead of a single catch-all, so a consumer can match
//! exhaustively on `EventKind` without a wildcard arm.

use std::time::{Instant, SystemTime};

/// §3 `ProcessState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessState {
    #[default]
    Stopped,
    Starting,
    Running,
    Failed,
}

/// §3/§4.7 `Event` kind tag. Each variant carries only the fields meaningful
/// to it rather than every `Event` field being optional on every kind.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Started { pid: u32 },
    Stopped,
    Failed { exit_code: i32, error: Option<String> },
    Restarting,
    Exhausted,
    Unhealthy { reason: String },
}

/// §3 `Event`. `pid` is 0 when not applicable, matching the spec's "PID (0 if
/// absent)" rather than wrapping it in another `Option`.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub service_name: String,
    pub pid: u32,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub timestamp: SystemTime,
}

impl Event {
    pub fn new(service_name: impl Into<String>, kind: EventKind) -> Self {
        let (pid, exit_code, error) = match &kind {
            EventKind::Started { pid } => (*pid, None, None),
            EventKind::Stopped => (0, Some(0), None),
            EventKind::Failed { exit_code, error } => (0, Some(*exit_code), error.clone()),
            EventKind::Restarting | EventKind::Exhausted => (0, None, None),
            EventKind::Unhealthy { reason } => (0, None, Some(reason.clone())),
        };
        Self {
            kind,
            service_name: service_name.into(),
            pid,
            exit_code,
            error,
            timestamp: SystemTime::now(),
        }
    }

    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = pid;
        self
    }
}

/// §3 read-only `Status snapshot`, returned by `LifecycleManager::status`.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    pub state: ProcessState,
    pub pid: u32,
    pub uptime: Option<std::time::Duration>,
    pub restarts: u32,
    pub last_exit_code: Option<i32>,
}

impl Status {
    /// Uptime as of `now`, as read through a [`crate::clock::Clock`] rather
    /// than via `Instant::elapsed` so it stays deterministic under a mock
    /// clock.
    pub fn uptime_since(now: Instant, start: Option<Instant>) -> Option<std::time::Duration> {
        start.map(|s| now.duration_since(s))
    }
}

/// §4.6 monitoring event, mirroring the lifecycle `Event` shape for the probe
/// side of the bus: service+listener names, current streaks, and the last
/// result, rather than reusing `Event` with unused fields.
#[derive(Debug, Clone)]
pub struct ProbeEvent {
    pub service_name: String,
    pub listener_name: String,
    pub success_streak: u32,
    pub failure_streak: u32,
    pub last_result: crate::probe::ProbeResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn started_event_carries_pid_failed_carries_exit_code() {
        let started = Event::new("echo", EventKind::Started { pid: 1234 });
        assert_eq!(started.pid, 1234);
        assert_eq!(started.exit_code, None);

        let failed = Event::new(
            "echo",
            EventKind::Failed {
                exit_code: 1,
                error: None,
            },
        );
        assert_eq!(failed.exit_code, Some(1));
        assert_eq!(failed.pid, 0);
    }
}
