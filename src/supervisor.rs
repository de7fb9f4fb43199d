//! Top-level wiring described in §2 "Control flow": one lifecycle manager
//! per configured service, one shared probe monitor, with each service's
//! probed listeners registered against the monitor so that a threshold
//! breach calls back into the owning manager's
//! [`LifecycleManager::restart_on_health_failure`].
//!
//! This is glue, not a new subsystem: config loading, service discovery, and
//! daemon bootstrap remain external collaborators (§1); `Supervisor` only
//! owns the wiring between the two in-scope subsystems.

use crate::config::ServiceConfig;
use crate::error::LifecycleError;
use crate::executor::ProcessExecutor;
use crate::lifecycle::LifecycleManager;
use crate::monitor::ProbeMonitor;
use std::sync::Arc;
use tracing::warn;

pub struct Supervisor {
    managers: Vec<Arc<LifecycleManager>>,
    monitor: ProbeMonitor,
}

impl Supervisor {
    /// Builds one [`LifecycleManager`] per `services` entry (sharing
    /// `executor`) and registers every listener carrying a `probe` section
    /// with a single shared [`ProbeMonitor`].
    pub fn new(services: Vec<ServiceConfig>, executor: Arc<dyn ProcessExecutor>) -> Self {
        let monitor = ProbeMonitor::new();
        let mut managers = Vec::with_capacity(services.len());

        for config in services {
            let listeners = config.listeners.clone();
            let service_name = config.name.clone();
            let manager = Arc::new(LifecycleManager::new(config, executor.clone()));
            managers.push(manager.clone());

            for listener in &listeners {
                if listener.probe.is_none() {
                    continue;
                }
                let callback_manager = manager.clone();
                let liveness: crate::monitor::LivenessCallback = Arc::new(move |reason: &str| {
                    if let Err(err) = callback_manager.restart_on_health_failure(reason) {
                        warn!(
                            service = callback_manager.service_name(),
                            "liveness callback on a manager that is not running: {err}"
                        );
                    }
                });
                if let Err(err) = monitor.add_listener(&service_name, listener, liveness) {
                    warn!(service = %service_name, listener = %listener.name, "failed to register probe: {err}");
                }
            }
        }

        Self { managers, monitor }
    }

    /// Starts every lifecycle manager. Stops at the first error, leaving
    /// managers already started running (callers inspect the returned error
    /// and decide whether to call [`Supervisor::stop`]).
    pub fn start_all(&self) -> Result<(), LifecycleError> {
        for manager in &self.managers {
            manager.start()?;
        }
        Ok(())
    }

    pub fn managers(&self) -> &[Arc<LifecycleManager>] {
        &self.managers
    }

    pub fn manager(&self, service_name: &str) -> Option<&Arc<LifecycleManager>> {
        self.managers
            .iter()
            .find(|m| m.service_name() == service_name)
    }

    pub fn monitor(&self) -> &ProbeMonitor {
        &self.monitor
    }

    /// Stops the probe monitor first so in-flight probes can't race a
    /// liveness callback against a manager that is being torn down, then
    /// stops every lifecycle manager.
    pub fn stop_all(&self) {
        self.monitor.stop();
        for manager in &self.managers {
            if let Err(err) = manager.stop() {
                warn!(service = manager.service_name(), "error stopping: {err}");
            }
        }
    }
}
