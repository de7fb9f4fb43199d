//! Concrete OS implementation of [`ProcessExecutor`], grounded on the
//! teacher's `CommandOSNotStarted`/`CommandOSStarted` (spawn with piped
//! stdout/stderr, `get_pid`, `is_running`, `wait`) and `ProcessTerminator`
//! (SIGTERM-then-SIGKILL shutdown). Child output is drained and logged
//! opaquely (§1 non-goal: no interpretation of child-process output beyond
//! capture), rather than streamed to per-child file loggers as the teacher
//! does, since file-backed log routing is outside this spec's scope.

use super::{ExecutorError, ExitResult, ProcessExecutor, ProcessSpec, SignalKind, StartedProcess};
use crate::util::channel::pub_sub;
use crate::util::threads::spawn_named_thread;
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
pub struct OsProcessExecutor;

impl OsProcessExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessExecutor for OsProcessExecutor {
    fn start(&self, spec: &ProcessSpec) -> Result<StartedProcess, ExecutorError> {
        let mut command = Command::new(&spec.command);
        command
            .args(&spec.args)
            .envs(&spec.environment)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.working_directory {
            command.current_dir(dir);
        }
        platform::apply_identity(&mut command, spec.uid, spec.gid);

        let mut child = command
            .spawn()
            .map_err(|err| ExecutorError::StartFailed(err.to_string()))?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            drain_opaquely(stdout, pid, "stdout");
        }
        if let Some(stderr) = child.stderr.take() {
            drain_opaquely(stderr, pid, "stderr");
        }

        let (publisher, consumer) = pub_sub::<ExitResult>();
        spawn_named_thread(format!("proc-wait-{pid}"), move || {
            let result = match child.wait() {
                Ok(status) => ExitResult {
                    code: status.code().unwrap_or(-1),
                    error: None,
                },
                Err(err) => ExitResult {
                    code: -1,
                    error: Some(err.to_string()),
                },
            };
            let _ = publisher.publish(result);
        });

        Ok(StartedProcess {
            pid,
            exit_consumer: consumer,
        })
    }

    fn stop(&self, pid: u32, timeout: Duration) -> Result<(), ExecutorError> {
        platform::stop(pid, timeout)
    }

    fn signal(&self, pid: u32, signal: SignalKind) -> Result<(), ExecutorError> {
        platform::signal(pid, signal)
    }
}

fn drain_opaquely<R: std::io::Read + Send + 'static>(reader: R, pid: u32, stream: &'static str) {
    spawn_named_thread(format!("proc-{stream}-{pid}"), move || {
        let reader = BufReader::new(reader);
        for line in reader.lines().map_while(Result::ok) {
            debug!(pid, stream, "{line}");
        }
    });
}

#[cfg(target_family = "unix")]
mod platform {
    use super::*;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;
    use std::os::unix::process::CommandExt;

    /// Drops the child into the configured user/group before exec, the same
    /// way the supervisor itself is expected to run as root only long enough
    /// to spawn unprivileged children.
    pub fn apply_identity(command: &mut std::process::Command, uid: Option<u32>, gid: Option<u32>) {
        if let Some(gid) = gid {
            command.gid(gid);
        }
        if let Some(uid) = uid {
            command.uid(uid);
        }
    }

    pub fn stop(pid: u32, timeout: Duration) -> Result<(), ExecutorError> {
        let raw_pid = Pid::from_raw(pid as i32);
        match signal::kill(raw_pid, Signal::SIGTERM) {
            Ok(()) => {}
            Err(nix::errno::Errno::ESRCH) => return Ok(()),
            Err(err) => warn!(pid, "SIGTERM delivery failed: {err}, forcing SIGKILL"),
        }

        if is_running_after_timeout(raw_pid, timeout) {
            return match signal::kill(raw_pid, Signal::SIGKILL) {
                Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
                Err(err) => Err(ExecutorError::SignalFailed(err.to_string())),
            };
        }
        Ok(())
    }

    pub fn signal(pid: u32, kind: SignalKind) -> Result<(), ExecutorError> {
        let raw_pid = Pid::from_raw(pid as i32);
        let sig = match kind {
            SignalKind::Reload => Signal::SIGHUP,
        };
        match signal::kill(raw_pid, sig) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => Err(ExecutorError::NotFound(pid)),
            Err(err) => Err(ExecutorError::SignalFailed(err.to_string())),
        }
    }

    fn is_running_after_timeout(pid: Pid, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            match signal::kill(pid, None) {
                Ok(()) => std::thread::sleep(POLL_INTERVAL),
                Err(_) => return false,
            }
        }
        true
    }
}

#[cfg(target_family = "windows")]
mod platform {
    use super::*;

    pub fn apply_identity(_command: &mut std::process::Command, uid: Option<u32>, gid: Option<u32>) {
        if uid.is_some() || gid.is_some() {
            warn!("user/group identity is not supported on this platform, ignoring");
        }
    }

    pub fn stop(_pid: u32, _timeout: Duration) -> Result<(), ExecutorError> {
        Err(ExecutorError::SignalFailed(
            "graceful stop is not supported on this platform".to_string(),
        ))
    }

    pub fn signal(_pid: u32, _kind: SignalKind) -> Result<(), ExecutorError> {
        Err(ExecutorError::SignalFailed(
            "signal delivery is not supported on this platform".to_string(),
        ))
    }
}

#[cfg(all(test, target_family = "unix"))]
mod tests {
    use super::*;

    #[test]
    fn start_runs_a_trivial_command_and_reports_its_exit_code() {
        let executor = OsProcessExecutor::new();
        let spec = ProcessSpec::new("/bin/sh").with_args(vec!["-c".to_string(), "exit 7".to_string()]);
        let started = executor.start(&spec).unwrap();
        assert!(started.pid > 0);
        let result = started
            .exit_consumer
            .as_ref()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(result.code, 7);
    }

    #[test]
    fn stop_on_an_already_gone_process_is_benign() {
        let executor = OsProcessExecutor::new();
        // A pid astronomically unlikely to be in use.
        let result = executor.stop(u32::MAX - 1, Duration::from_millis(50));
        assert!(result.is_ok());
    }

    #[test]
    fn start_applies_identity_when_spec_carries_the_current_uid() {
        // Dropping to a *different* uid requires root; re-asserting the
        // caller's own uid is always permitted and still exercises the
        // `apply_identity` wiring end to end.
        let uid = nix::unistd::getuid().as_raw();
        let executor = OsProcessExecutor::new();
        let spec = ProcessSpec::new("/bin/sh")
            .with_args(vec!["-c".to_string(), "exit 0".to_string()])
            .with_identity(Some(uid), None);
        let started = executor.start(&spec).unwrap();
        let result = started
            .exit_consumer
            .as_ref()
            .recv_timeout(Duration::from_secs(5))
            .unwrap();
        assert_eq!(result.code, 0);
    }
}
