//! A named background thread paired with a cancellation channel: the
//! building block every long-running loop in this crate (the lifecycle
//! manager's main loop, each probe monitor's per-listener scheduler) is built
//! from.

use std::{
    thread::JoinHandle,
    time::Duration,
};

const GRACEFUL_STOP_RETRY: u16 = 10;
const GRACEFUL_STOP_RETRY_INTERVAL: Duration = Duration::from_millis(100);

use crate::util::{
    cancellation::CancellationMessage,
    channel::{EventConsumer, EventPublisher, pub_sub},
    threads::spawn_named_thread,
};

pub struct NotStartedThreadContext<F, T>
where
    F: FnOnce(EventConsumer<CancellationMessage>) -> T + Send + 'static,
    T: Send + 'static,
{
    thread_name: String,
    callback: F,
}

impl<F, T> NotStartedThreadContext<F, T>
where
    F: FnOnce(EventConsumer<CancellationMessage>) -> T + Send + 'static,
    T: Send + 'static,
{
    pub fn new<S: Into<String>>(thread_name: S, callback: F) -> Self {
        Self {
            thread_name: thread_name.into(),
            callback,
        }
    }

    pub fn start(self) -> StartedThreadContext {
        let (stop_publisher, stop_consumer) = pub_sub::<CancellationMessage>();

        StartedThreadContext::new(
            self.thread_name.clone(),
            stop_publisher,
            spawn_named_thread(&self.thread_name, move || {
                (self.callback)(stop_consumer);
            }),
        )
    }
}

pub struct StartedThreadContext {
    thread_name: String,
    stop_publisher: EventPublisher<CancellationMessage>,
    join_handle: JoinHandle<()>,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ThreadContextStopperError {
    #[error("error sending stop signal to '{0}' thread: {1}")]
    EventPublisherError(String, String),

    #[error("error joining '{0}' thread")]
    JoinError(String),

    #[error("timeout waiting for '{0}' thread to finish")]
    StopTimeout(String),
}

impl StartedThreadContext {
    pub fn new(
        thread_name: String,
        stop_publisher: EventPublisher<CancellationMessage>,
        join_handle: JoinHandle<()>,
    ) -> Self {
        Self {
            thread_name,
            stop_publisher,
            join_handle,
        }
    }

    pub fn thread_name(&self) -> &str {
        &self.thread_name
    }

    /// Sends a stop signal and polls until the thread finishes or
    /// `GRACEFUL_STOP_RETRY * GRACEFUL_STOP_RETRY_INTERVAL` elapses.
    pub fn stop(self) -> Result<(), ThreadContextStopperError> {
        self.stop_publisher.publish(()).map_err(|err| {
            ThreadContextStopperError::EventPublisherError(
                self.thread_name.clone(),
                err.to_string(),
            )
        })?;
        for _ in 0..GRACEFUL_STOP_RETRY {
            if self.join_handle.is_finished() {
                return self.join_handle.join().map_err(|err| {
                    ThreadContextStopperError::JoinError(
                        err.downcast_ref::<&str>()
                            .unwrap_or(&"unknown error")
                            .to_string(),
                    )
                });
            }
            std::thread::sleep(GRACEFUL_STOP_RETRY_INTERVAL);
        }

        Err(ThreadContextStopperError::StopTimeout(self.thread_name))
    }

    /// Sends a stop signal and blocks until the thread handle is joined.
    pub fn stop_blocking(self) -> Result<(), ThreadContextStopperError> {
        self.stop_publisher.publish(()).map_err(|err| {
            ThreadContextStopperError::EventPublisherError(
                self.thread_name.clone(),
                err.to_string(),
            )
        })?;
        self.join_handle.join().map_err(|err| {
            ThreadContextStopperError::JoinError(
                err.downcast_ref::<&str>()
                    .unwrap_or(&"unknown error")
                    .to_string(),
            )
        })
    }
}
