//! Per-service lifecycle manager: the restart-loop state machine (§4.3),
//! grounded on the teacher's `start_process_thread`/`wait_for_termination`
//! in `sub_agent::on_host::supervisor`.
//!
//! One deliberate departure from that shape: the teacher splits
//! `NotStartedSupervisorOnHost`/`StartedSupervisorOnHost` into two types so
//! `start` consumes the former and returns the latter. Here `Start`/`Stop`/
//! `Reload`/`Events`/`Status` are all described (§4.3) as operations on the
//! *same* manager handle, with an explicit "second start is rejected as
//! AlreadyRunning" rule — a type-state split can't express "reject, don't
//! reconstruct", so this manager instead holds its runtime fields behind the
//! per-manager read/write lock §5 calls for directly.

use crate::clock::{Clock, SystemClock};
use crate::config::{RestartConfig, RestartPolicy, ServiceConfig};
use crate::error::LifecycleError;
use crate::event::{Event, EventKind, ProcessState, Status};
use crate::executor::{resolve_identity, ExitResult, ProcessExecutor, ProcessSpec, SignalKind};
use crate::restart::RestartTracker;
use crate::types::{EventBufferSize, ManagerStopTimeout};
use crate::util::cancellation::CancellationMessage;
use crate::util::channel::{bounded_pub_sub, EventConsumer, EventPublisher};
use crate::util::thread_context::{NotStartedThreadContext, StartedThreadContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct ManagerInner {
    state: ProcessState,
    pid: u32,
    start_time: Option<Instant>,
    last_exit_code: Option<i32>,
    restarts: u32,
}

pub struct LifecycleManager {
    service_name: String,
    spec: ProcessSpec,
    oneshot: bool,
    restart_config: RestartConfig,
    stop_timeout: Duration,
    executor: Arc<dyn ProcessExecutor>,
    clock: Arc<dyn Clock>,
    inner: Arc<RwLock<ManagerInner>>,
    event_publisher: EventPublisher<Event>,
    event_consumer: EventConsumer<Event>,
    started: AtomicBool,
    thread_context: Mutex<Option<StartedThreadContext>>,
}

impl LifecycleManager {
    pub fn new(config: ServiceConfig, executor: Arc<dyn ProcessExecutor>) -> Self {
        Self::new_with_clock(config, executor, Arc::new(SystemClock::new()))
    }

    /// Same as [`Self::new`] but with an injectable [`Clock`], the seam tests
    /// use to drive the stability-window reset (§8.2) deterministically.
    pub fn new_with_clock(
        config: ServiceConfig,
        executor: Arc<dyn ProcessExecutor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (uid, gid) = resolve_identity(config.user.as_deref(), config.group.as_deref())
            .unwrap_or_else(|err| {
                warn!(
                    service = config.name,
                    "failed to resolve user/group identity, running as the supervisor's own identity: {err}"
                );
                (None, None)
            });

        let spec = ProcessSpec::new(config.command)
            .with_args(config.args)
            .with_working_directory(config.working_directory.map(Into::into))
            .with_environment(config.environment)
            .with_identity(uid, gid);

        let (event_publisher, event_consumer) =
            bounded_pub_sub::<Event>(EventBufferSize::default().get());

        Self {
            service_name: config.name,
            spec,
            oneshot: config.oneshot,
            restart_config: config.restart,
            stop_timeout: ManagerStopTimeout::default().get(),
            executor,
            clock,
            inner: Arc::new(RwLock::new(ManagerInner::default())),
            event_publisher,
            event_consumer,
            started: AtomicBool::new(false),
            thread_context: Mutex::new(None),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// §4.3 `Start()`.
    pub fn start(&self) -> Result<(), LifecycleError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(LifecycleError::AlreadyRunning(self.service_name.clone()));
        }

        let service_name = self.service_name.clone();
        let spec = self.spec.clone();
        let oneshot = self.oneshot;
        let restart_config = self.restart_config.clone();
        let stop_timeout = self.stop_timeout;
        let executor = self.executor.clone();
        let clock = self.clock.clone();
        let inner = self.inner.clone();
        let events = self.event_publisher.clone();

        let thread_name = format!("lifecycle-{service_name}");
        let ctx = NotStartedThreadContext::new(thread_name, move |stop_consumer| {
            if oneshot {
                run_oneshot(
                    &stop_consumer,
                    &service_name,
                    &spec,
                    stop_timeout,
                    &executor,
                    &clock,
                    &inner,
                    &events,
                );
            } else {
                run_supervised(
                    &stop_consumer,
                    &service_name,
                    &spec,
                    &restart_config,
                    stop_timeout,
                    &executor,
                    &clock,
                    &inner,
                    &events,
                );
            }
        })
        .start();

        *self.thread_context.lock().unwrap() = Some(ctx);
        Ok(())
    }

    /// §4.3 `Stop()`. A no-op, returning `Ok`, when not running.
    pub fn stop(&self) -> Result<(), LifecycleError> {
        if let Some(ctx) = self.thread_context.lock().unwrap().take() {
            if let Err(err) = ctx.stop_blocking() {
                warn!(service = self.service_name, "error stopping lifecycle thread: {err}");
            }
        }
        Ok(())
    }

    /// §4.3 `Reload()`.
    pub fn reload(&self) -> Result<(), LifecycleError> {
        let pid = self.inner.read().unwrap().pid;
        if pid == 0 {
            return Err(LifecycleError::NotRunning(self.service_name.clone()));
        }
        if let Err(err) = self.executor.signal(pid, SignalKind::Reload) {
            warn!(service = self.service_name, "reload signal failed: {err}");
        }
        Ok(())
    }

    /// §4.3 `Events()`.
    pub fn events(&self) -> EventConsumer<Event> {
        self.event_consumer.clone()
    }

    pub fn state(&self) -> ProcessState {
        self.inner.read().unwrap().state
    }

    pub fn pid(&self) -> u32 {
        self.inner.read().unwrap().pid
    }

    pub fn uptime(&self) -> Option<Duration> {
        let guard = self.inner.read().unwrap();
        Status::uptime_since(self.clock.now(), guard.start_time)
    }

    /// §3 `Status snapshot`.
    pub fn status(&self) -> Status {
        let guard = self.inner.read().unwrap();
        Status {
            state: guard.state,
            pid: guard.pid,
            uptime: Status::uptime_since(self.clock.now(), guard.start_time),
            restarts: guard.restarts,
            last_exit_code: guard.last_exit_code,
        }
    }

    /// §4.3 `RestartOnHealthFailure(reason)`, the liveness callback the probe
    /// monitor invokes.
    pub fn restart_on_health_failure(&self, reason: impl Into<String>) -> Result<(), LifecycleError> {
        let pid = self.inner.read().unwrap().pid;
        if pid == 0 {
            return Err(LifecycleError::NotRunning(self.service_name.clone()));
        }
        self.event_publisher.try_publish(Event::new(
            &self.service_name,
            EventKind::Unhealthy {
                reason: reason.into(),
            },
        ));
        if let Err(err) = self.executor.stop(pid, self.stop_timeout) {
            debug!(service = self.service_name, "stop during liveness kill: {err}");
        }
        Ok(())
    }
}

enum WaitOutcome {
    ShuttingDown,
    Exited(ExitResult),
}

fn wait_for_exit_or_shutdown(
    exit_consumer: &EventConsumer<ExitResult>,
    stop_consumer: &EventConsumer<CancellationMessage>,
) -> WaitOutcome {
    crossbeam::channel::select! {
        recv(stop_consumer.as_ref()) -> _ => WaitOutcome::ShuttingDown,
        recv(exit_consumer.as_ref()) -> msg => match msg {
            Ok(result) => WaitOutcome::Exited(result),
            Err(_) => WaitOutcome::Exited(ExitResult {
                code: -1,
                error: Some("exit channel disconnected unexpectedly".to_string()),
            }),
        },
    }
}

#[allow(clippy::too_many_arguments)]
fn run_oneshot(
    stop_consumer: &EventConsumer<CancellationMessage>,
    service_name: &str,
    spec: &ProcessSpec,
    stop_timeout: Duration,
    executor: &Arc<dyn ProcessExecutor>,
    clock: &Arc<dyn Clock>,
    inner: &Arc<RwLock<ManagerInner>>,
    events: &EventPublisher<Event>,
) {
    match executor.start(spec) {
        Ok(started) => {
            mark_running(inner, clock, started.pid);
            events.try_publish(Event::new(service_name, EventKind::Started { pid: started.pid }));

            match wait_for_exit_or_shutdown(&started.exit_consumer, stop_consumer) {
                WaitOutcome::ShuttingDown => {
                    let _ = executor.stop(started.pid, stop_timeout);
                    mark_stopped(inner, Some(0));
                }
                WaitOutcome::Exited(result) => {
                    mark_stopped(inner, Some(result.code));
                    emit_exit_event(events, service_name, result.code, result.error);
                }
            }
        }
        Err(err) => {
            mark_failed(inner);
            events.try_publish(Event::new(
                service_name,
                EventKind::Failed {
                    exit_code: -1,
                    error: Some(err.to_string()),
                },
            ));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_supervised(
    stop_consumer: &EventConsumer<CancellationMessage>,
    service_name: &str,
    spec: &ProcessSpec,
    restart_config: &RestartConfig,
    stop_timeout: Duration,
    executor: &Arc<dyn ProcessExecutor>,
    clock: &Arc<dyn Clock>,
    inner: &Arc<RwLock<ManagerInner>>,
    events: &EventPublisher<Event>,
) {
    let mut tracker = RestartTracker::new(restart_config);

    loop {
        if stop_consumer.is_cancelled(Duration::ZERO) {
            return;
        }

        match executor.start(spec) {
            Ok(started) => {
                mark_running(inner, clock, started.pid);
                events.try_publish(Event::new(service_name, EventKind::Started { pid: started.pid }));

                match wait_for_exit_or_shutdown(&started.exit_consumer, stop_consumer) {
                    WaitOutcome::ShuttingDown => {
                        let _ = executor.stop(started.pid, stop_timeout);
                        mark_stopped(inner, None);
                        return;
                    }
                    WaitOutcome::Exited(result) => {
                        let uptime = Status::uptime_since(clock.now(), inner.read().unwrap().start_time)
                            .unwrap_or_default();
                        mark_stopped(inner, Some(result.code));
                        emit_exit_event(events, service_name, result.code, result.error);
                        tracker.maybe_reset(uptime);

                        if !restart_and_wait(&mut tracker, result.code, stop_consumer, inner, events, service_name) {
                            return;
                        }
                    }
                }
            }
            Err(err) => {
                mark_failed(inner);
                events.try_publish(Event::new(
                    service_name,
                    EventKind::Failed {
                        exit_code: -1,
                        error: Some(err.to_string()),
                    },
                ));

                if !restart_and_wait(&mut tracker, -1, stop_consumer, inner, events, service_name) {
                    return;
                }
            }
        }
    }
}

/// §4.3 step 4(c)/(d): decide whether to restart, emitting `Restarting` and
/// sleeping the backoff delay, or emitting `Exhausted` per policy and
/// stopping the loop. Returns whether the caller should continue looping.
fn restart_and_wait(
    tracker: &mut RestartTracker,
    exit_code: i32,
    stop_consumer: &EventConsumer<CancellationMessage>,
    inner: &Arc<RwLock<ManagerInner>>,
    events: &EventPublisher<Event>,
    service_name: &str,
) -> bool {
    if tracker.should_restart(exit_code) {
        tracker.record_attempt();
        inner.write().unwrap().restarts += 1;
        events.try_publish(Event::new(service_name, EventKind::Restarting));

        let delay = tracker.next_delay();
        !stop_consumer.is_cancelled(delay)
    } else {
        if tracker.is_exhausted() && should_emit_exhausted(tracker.policy(), exit_code) {
            events.try_publish(Event::new(service_name, EventKind::Exhausted));
        }
        false
    }
}

fn should_emit_exhausted(policy: RestartPolicy, exit_code: i32) -> bool {
    match policy {
        RestartPolicy::Always => true,
        RestartPolicy::OnFailure => exit_code != 0,
        RestartPolicy::Never | RestartPolicy::UnlessStopped => false,
    }
}

fn emit_exit_event(events: &EventPublisher<Event>, service_name: &str, code: i32, error: Option<String>) {
    if code == 0 {
        events.try_publish(Event::new(service_name, EventKind::Stopped));
    } else {
        events.try_publish(Event::new(
            service_name,
            EventKind::Failed {
                exit_code: code,
                error,
            },
        ));
    }
}

fn mark_running(inner: &Arc<RwLock<ManagerInner>>, clock: &Arc<dyn Clock>, pid: u32) {
    let mut guard = inner.write().unwrap();
    guard.state = ProcessState::Running;
    guard.pid = pid;
    guard.start_time = Some(clock.now());
}

fn mark_stopped(inner: &Arc<RwLock<ManagerInner>>, exit_code: Option<i32>) {
    let mut guard = inner.write().unwrap();
    guard.state = match exit_code {
        Some(0) | None => ProcessState::Stopped,
        Some(_) => ProcessState::Failed,
    };
    guard.pid = 0;
    if let Some(code) = exit_code {
        guard.last_exit_code = Some(code);
    }
}

fn mark_failed(inner: &Arc<RwLock<ManagerInner>>) {
    let mut guard = inner.write().unwrap();
    guard.state = ProcessState::Failed;
    guard.pid = 0;
}
