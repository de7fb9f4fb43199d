//! Listener health-probe monitor (§4.6): one independent scheduler thread
//! per registered listener, hysteresis over consecutive success/failure
//! streaks, and a liveness callback into the owning service's lifecycle
//! manager. Grounded on the teacher's `spawn_health_checker`: a
//! `NotStartedThreadContext` callback looping "probe, publish, sleep on the
//! cancellable interval" — generalized here from one health check per agent
//! to one prober per registered listener.

use crate::config::{ListenerConfig, ProbeConfig};
use crate::error::ListenerRegistrationError;
use crate::event::ProbeEvent;
use crate::probe::{Prober, ProberFactory};
use crate::types::EventBufferSize;
use crate::util::channel::{bounded_pub_sub, EventConsumer, EventPublisher};
use crate::util::thread_context::{NotStartedThreadContext, StartedThreadContext};
use std::sync::{Arc, Mutex};

/// The narrow interface the monitor uses to signal a lifecycle manager that
/// one of its listeners has failed beyond its threshold (§4.3
/// `RestartOnHealthFailure`, §GLOSSARY "liveness callback").
pub type LivenessCallback = Arc<dyn Fn(&str) + Send + Sync>;

pub struct ProbeMonitor {
    factory: ProberFactory,
    event_publisher: EventPublisher<ProbeEvent>,
    event_consumer: EventConsumer<ProbeEvent>,
    thread_contexts: Mutex<Vec<StartedThreadContext>>,
}

impl ProbeMonitor {
    pub fn new() -> Self {
        Self::with_factory(ProberFactory::new())
    }

    pub fn with_factory(factory: ProberFactory) -> Self {
        let (event_publisher, event_consumer) =
            bounded_pub_sub::<ProbeEvent>(EventBufferSize::default().get());
        Self {
            factory,
            event_publisher,
            event_consumer,
            thread_contexts: Mutex::new(Vec::new()),
        }
    }

    /// §4.6 `AddListener(serviceName, listener, liveness)`. A listener with
    /// no `ProbeConfig` is registered as a no-op (port-presence enumeration
    /// is out of scope, §1).
    pub fn add_listener(
        &self,
        service_name: &str,
        listener: &ListenerConfig,
        liveness: LivenessCallback,
    ) -> Result<(), ListenerRegistrationError> {
        let Some(probe) = listener.probe.as_ref() else {
            return Ok(());
        };

        let common = probe.common();
        common.validate()?;
        let prober = self.factory.create(probe.type_tag(), common.timeout.get())?;
        let target = crate::config::ProbeTarget::from_listener(service_name, listener, probe);
        let interval = common.interval.get();
        let timeout = common.timeout.get();
        let success_threshold = common.success_threshold.get().max(1);
        let failure_threshold = common.failure_threshold.get().max(1);

        let events = self.event_publisher.clone();
        let service_name = service_name.to_string();
        let listener_name = listener.name.clone();
        let thread_name = format!("probe-{service_name}-{listener_name}");

        let ctx = NotStartedThreadContext::new(thread_name, move |stop_consumer| {
            run_schedule(
                &*prober,
                &target,
                timeout,
                interval,
                success_threshold,
                failure_threshold,
                &liveness,
                &events,
                &service_name,
                &listener_name,
                &stop_consumer,
            );
        })
        .start();

        self.thread_contexts.lock().unwrap().push(ctx);
        Ok(())
    }

    pub fn events(&self) -> EventConsumer<ProbeEvent> {
        self.event_consumer.clone()
    }

    /// §4.6 `Stop(monitor)`: cancels every per-listener scheduler and waits
    /// for in-flight probes to return.
    pub fn stop(&self) {
        let contexts = std::mem::take(&mut *self.thread_contexts.lock().unwrap());
        for ctx in contexts {
            let name = ctx.thread_name().to_string();
            if let Err(err) = ctx.stop_blocking() {
                tracing::warn!("error stopping probe scheduler '{name}': {err}");
            }
        }
    }
}

impl Default for ProbeMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::too_many_arguments)]
fn run_schedule(
    prober: &dyn Prober,
    target: &crate::config::ProbeTarget,
    timeout: std::time::Duration,
    interval: std::time::Duration,
    success_threshold: u32,
    failure_threshold: u32,
    liveness: &LivenessCallback,
    events: &EventPublisher<ProbeEvent>,
    service_name: &str,
    listener_name: &str,
    stop_consumer: &crate::util::channel::EventConsumer<crate::util::cancellation::CancellationMessage>,
) {
    let mut success_streak = 0u32;
    let mut failure_streak = 0u32;
    let mut unhealthy = false;

    loop {
        let result = prober.probe(target, timeout);

        if result.success {
            failure_streak = 0;
            success_streak += 1;
            if unhealthy && success_streak >= success_threshold {
                unhealthy = false;
            }
        } else {
            success_streak = 0;
            failure_streak += 1;
            if failure_streak >= failure_threshold {
                unhealthy = true;
                let reason = format!(
                    "listener '{listener_name}' probe failed: {}",
                    result
                        .error
                        .as_ref()
                        .map(ToString::to_string)
                        .unwrap_or_else(|| "unknown error".to_string())
                );
                liveness(&reason);
                failure_streak = 0;
            }
        }

        events.try_publish(ProbeEvent {
            service_name: service_name.to_string(),
            listener_name: listener_name.to_string(),
            success_streak,
            failure_streak,
            last_result: result,
        });

        if stop_consumer.is_cancelled(interval) {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IcmpMode, ProbeTarget};
    use crate::error::ProbeError;
    use crate::probe::ProbeResult;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn no_probe_config_registers_as_a_noop() {
        let monitor = ProbeMonitor::new();
        let listener = ListenerConfig {
            name: "plain".to_string(),
            port: 9090,
            protocol: crate::config::ListenerProtocol::Tcp,
            address: String::new(),
            exposed: false,
            probe: None,
        };
        assert!(monitor
            .add_listener("svc", &listener, Arc::new(|_| {}))
            .is_ok());
        monitor.stop();
    }

    #[test]
    fn invalid_probe_config_is_rejected_before_a_scheduler_is_spawned() {
        let monitor = ProbeMonitor::new();
        let listener = ListenerConfig {
            name: "web".to_string(),
            port: 8080,
            protocol: crate::config::ListenerProtocol::Tcp,
            address: String::new(),
            exposed: true,
            probe: Some(ProbeConfig::Tcp(crate::config::ProbeCommon {
                interval: Duration::ZERO.into(),
                timeout: crate::types::ProbeTimeout::default(),
                success_threshold: crate::types::SuccessThreshold::default(),
                failure_threshold: crate::types::FailureThreshold::default(),
            })),
        };

        let err = monitor
            .add_listener("svc", &listener, Arc::new(|_| {}))
            .unwrap_err();
        assert_matches::assert_matches!(
            err,
            crate::error::ListenerRegistrationError::InvalidConfig(
                crate::error::ProbeConfigError::InvalidInterval(_)
            )
        );
        monitor.stop();
    }

    #[test]
    fn hysteresis_fires_liveness_exactly_once_on_the_scripted_sequence() {
        // F, F, S, F, F, F -- liveness must fire exactly once, at the third
        // consecutive F following the single S that reset the streak.
        let script = vec![false, false, true, false, false, false];
        let (stop_publisher, stop_consumer) = crate::util::channel::pub_sub();
        let prober = ScriptedProber {
            script,
            index: AtomicUsize::new(0),
            cancel_on_last: stop_publisher,
        };

        let fire_count = Arc::new(AtomicUsize::new(0));
        let fire_count_clone = fire_count.clone();
        let liveness: LivenessCallback = Arc::new(move |_reason| {
            fire_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let target = ProbeTarget {
            service_name: "svc".to_string(),
            listener_name: "main".to_string(),
            address: "127.0.0.1:1".to_string(),
            http_path: "/".to_string(),
            http_method: "GET".to_string(),
            http_expected_status: 200,
            grpc_service: String::new(),
            exec_command: String::new(),
            exec_args: vec![],
            icmp_mode: IcmpMode::Auto,
        };
        let (events, events_consumer) = bounded_pub_sub::<ProbeEvent>(16);

        run_schedule(
            &prober,
            &target,
            Duration::from_millis(10),
            Duration::from_millis(1),
            2,
            3,
            &liveness,
            &events,
            "svc",
            "main",
            &stop_consumer,
        );

        assert_eq!(fire_count.load(Ordering::SeqCst), 1);
        assert_eq!(events_consumer.as_ref().len(), 6);
    }

    struct ScriptedProber {
        script: Vec<bool>,
        index: AtomicUsize,
        cancel_on_last: crate::util::channel::EventPublisher<
            crate::util::cancellation::CancellationMessage,
        >,
    }

    impl Prober for ScriptedProber {
        fn probe(&self, _target: &ProbeTarget, _timeout: Duration) -> ProbeResult {
            let i = self.index.fetch_add(1, Ordering::SeqCst);
            let success = self.script[i.min(self.script.len() - 1)];
            if i + 1 >= self.script.len() {
                let _ = self.cancel_on_last.publish(());
            }
            if success {
                ProbeResult::ok(Duration::from_millis(1), "ok")
            } else {
                ProbeResult::failed(Duration::from_millis(1), ProbeError::ConnectionRefused)
            }
        }
    }
}
