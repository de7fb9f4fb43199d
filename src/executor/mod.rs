//! Abstract interface over OS process spawn / stop / signal (§4.2). The
//! lifecycle manager never touches OS APIs directly; it only ever sees
//! [`ProcessExecutor`], the same separation the teacher draws between
//! `SupervisorStarter`/`SupervisorStopper` and the on-host `CommandOS`
//! implementation underneath them.

mod os;

pub use os::OsProcessExecutor;

use crate::util::channel::EventConsumer;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Everything needed to spawn a child process, the counterpart to the
/// teacher's `ExecutableData`. `uid`/`gid` are already-resolved numeric ids
/// (§4.2 "spawns the process per spec (command, args, dir, env, **user/group**)");
/// resolving the config's user/group *names* into these ids happens once, at
/// [`crate::lifecycle::LifecycleManager::new`] time, via [`resolve_identity`],
/// not on every restart.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    pub command: String,
    pub args: Vec<String>,
    pub working_directory: Option<PathBuf>,
    pub environment: HashMap<String, String>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl ProcessSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_directory: None,
            environment: HashMap::new(),
            uid: None,
            gid: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_directory(mut self, dir: Option<PathBuf>) -> Self {
        self.working_directory = dir;
        self
    }

    pub fn with_environment(mut self, env: HashMap<String, String>) -> Self {
        self.environment = env;
        self
    }

    pub fn with_identity(mut self, uid: Option<u32>, gid: Option<u32>) -> Self {
        self.uid = uid;
        self.gid = gid;
        self
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("unknown user '{0}'")]
    UnknownUser(String),
    #[error("unknown group '{0}'")]
    UnknownGroup(String),
    #[error("failed to look up user/group: {0}")]
    LookupFailed(String),
    #[error("user/group identity is not supported on this platform")]
    Unsupported,
}

/// Resolves the config's user/group *names* (§3 `ServiceConfig.user/group`)
/// into numeric uid/gid, once, at manager-construction time. `None` for
/// either input leaves the corresponding id unset (inherit the supervisor's
/// own).
pub fn resolve_identity(
    user: Option<&str>,
    group: Option<&str>,
) -> Result<(Option<u32>, Option<u32>), IdentityError> {
    platform::resolve_identity(user, group)
}

#[cfg(target_family = "unix")]
mod platform {
    use super::IdentityError;
    use nix::unistd::{Group, User};

    pub fn resolve_identity(
        user: Option<&str>,
        group: Option<&str>,
    ) -> Result<(Option<u32>, Option<u32>), IdentityError> {
        let uid = user
            .map(|name| {
                User::from_name(name)
                    .map_err(|err| IdentityError::LookupFailed(err.to_string()))?
                    .map(|u| u.uid.as_raw())
                    .ok_or_else(|| IdentityError::UnknownUser(name.to_string()))
            })
            .transpose()?;

        let gid = group
            .map(|name| {
                Group::from_name(name)
                    .map_err(|err| IdentityError::LookupFailed(err.to_string()))?
                    .map(|g| g.gid.as_raw())
                    .ok_or_else(|| IdentityError::UnknownGroup(name.to_string()))
            })
            .transpose()?;

        Ok((uid, gid))
    }
}

#[cfg(not(target_family = "unix"))]
mod platform {
    use super::IdentityError;

    pub fn resolve_identity(
        user: Option<&str>,
        group: Option<&str>,
    ) -> Result<(Option<u32>, Option<u32>), IdentityError> {
        if user.is_some() || group.is_some() {
            return Err(IdentityError::Unsupported);
        }
        Ok((None, None))
    }
}

/// §3 `ProbeResult`-shaped exit value: the wait channel yields exactly one of
/// these then closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitResult {
    pub code: i32,
    pub error: Option<String>,
}

/// A running child as handed back by [`ProcessExecutor::start`].
pub struct StartedProcess {
    pub pid: u32,
    pub exit_consumer: EventConsumer<ExitResult>,
}

/// The semantic intent of a signal, not its concrete OS value (§4.2, §9
/// "tagged variant replaces string comparison").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Reload,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("failed to start process: {0}")]
    StartFailed(String),
    #[error("process not found: pid {0}")]
    NotFound(u32),
    #[error("signal delivery failed: {0}")]
    SignalFailed(String),
}

/// §4.2 the narrow contract the lifecycle manager is built against. Mockable
/// via `mockall` the same way the teacher mocks `SupervisorStarter`.
pub trait ProcessExecutor: Send + Sync {
    fn start(&self, spec: &ProcessSpec) -> Result<StartedProcess, ExecutorError>;

    /// Requests graceful termination; force-kills after `timeout`. Safe to
    /// call when the process is already gone.
    fn stop(&self, pid: u32, timeout: Duration) -> Result<(), ExecutorError>;

    fn signal(&self, pid: u32, signal: SignalKind) -> Result<(), ExecutorError>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub ProcessExecutor {}

        impl ProcessExecutor for ProcessExecutor {
            fn start(&self, spec: &ProcessSpec) -> Result<StartedProcess, ExecutorError>;
            fn stop(&self, pid: u32, timeout: Duration) -> Result<(), ExecutorError>;
            fn signal(&self, pid: u32, signal: SignalKind) -> Result<(), ExecutorError>;
        }
    }
}
