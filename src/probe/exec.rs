//! Exec reachability probe (§4.4): spawn `target.exec_command` with
//! `target.exec_args`; success = exit 0. An empty or whitespace-only command
//! fails immediately without spawning.

use super::{timed, Prober, ProbeResult};
use crate::config::ProbeTarget;
use crate::error::ProbeError;
use std::process::Command;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct ExecProber;

impl ExecProber {
    pub fn new() -> Self {
        Self
    }
}

impl Prober for ExecProber {
    fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult {
        timed(|| {
            if target.exec_command.trim().is_empty() {
                return Err(ProbeError::Other("exec probe command is empty".to_string()));
            }

            let mut child = Command::new(&target.exec_command)
                .args(&target.exec_args)
                .spawn()
                .map_err(|err| ProbeError::Other(err.to_string()))?;

            match wait_with_timeout(&mut child, timeout) {
                Some(status) if status.success() => Ok("exit 0".to_string()),
                Some(status) => Err(ProbeError::Other(format!("exit {status}"))),
                None => {
                    let _ = child.kill();
                    Err(ProbeError::ProbeTimeout)
                }
            }
        })
    }
}

fn wait_with_timeout(
    child: &mut std::process::Child,
    timeout: Duration,
) -> Option<std::process::ExitStatus> {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        if std::time::Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(command: &str, args: Vec<&str>) -> ProbeTarget {
        ProbeTarget {
            service_name: "svc".to_string(),
            listener_name: "exec".to_string(),
            address: String::new(),
            http_path: "/".to_string(),
            http_method: "GET".to_string(),
            http_expected_status: 200,
            grpc_service: String::new(),
            exec_command: command.to_string(),
            exec_args: args.into_iter().map(str::to_string).collect(),
            icmp_mode: crate::config::IcmpMode::Auto,
        }
    }

    #[test]
    fn empty_command_fails_without_spawning() {
        let result = ExecProber::new().probe(&target("   ", vec![]), Duration::from_secs(1));
        assert!(!result.success);
    }

    #[test]
    fn exit_zero_is_success() {
        let result = ExecProber::new().probe(&target("/bin/true", vec![]), Duration::from_secs(1));
        assert!(result.success);
    }

    #[test]
    fn nonzero_exit_is_failure() {
        let result = ExecProber::new().probe(&target("/bin/false", vec![]), Duration::from_secs(1));
        assert!(!result.success);
    }
}
