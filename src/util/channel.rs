//! A small pub/sub wrapper over `crossbeam::channel`, in two flavors: an
//! unbounded one used for control signals (cancellation), and a bounded,
//! lossy one used for the observable event streams (§5/§7: a full channel
//! drops the newest event rather than blocking the producer).

use crossbeam::channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use thiserror::Error;

pub struct EventConsumer<E>(Receiver<E>);

impl<E> From<Receiver<E>> for EventConsumer<E> {
    fn from(value: Receiver<E>) -> Self {
        Self(value)
    }
}

pub struct EventPublisher<E>(Sender<E>);

impl<E> From<Sender<E>> for EventPublisher<E> {
    fn from(value: Sender<E>) -> Self {
        Self(value)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum EventPublisherError {
    #[error("error while publishing event: {0}")]
    SendError(String),
}

/// An unbounded publisher/consumer pair, used for control signals where loss
/// is never acceptable (e.g. cancellation messages).
pub fn pub_sub<E>() -> (EventPublisher<E>, EventConsumer<E>) {
    let (s, r) = unbounded();
    (EventPublisher(s), EventConsumer(r))
}

/// A bounded publisher/consumer pair whose `publish` is a non-blocking
/// try-send: when the channel is full, the newest event is dropped rather
/// than stalling the caller. This is the contract for manager/monitor event
/// streams (§5, §7, §9): "a slow consumer can never stall the control loop."
pub fn bounded_pub_sub<E>(capacity: usize) -> (EventPublisher<E>, EventConsumer<E>) {
    let (s, r) = bounded(capacity);
    (EventPublisher(s), EventConsumer(r))
}

impl<E> EventPublisher<E> {
    /// Blocking send. Only appropriate on unbounded channels.
    pub fn publish(&self, event: E) -> Result<(), EventPublisherError> {
        self.0
            .send(event)
            .map_err(|err| EventPublisherError::SendError(err.to_string()))
    }

    /// Non-blocking send: drops `event` and returns `Ok(())` if the channel
    /// is full, so a slow or absent consumer never blocks the producer.
    pub fn try_publish(&self, event: E) {
        match self.0.try_send(event) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl<E> Clone for EventPublisher<E> {
    fn clone(&self) -> Self {
        EventPublisher(self.0.clone())
    }
}

impl<E> AsRef<Receiver<E>> for EventConsumer<E> {
    fn as_ref(&self) -> &Receiver<E> {
        &self.0
    }
}

impl<E> Clone for EventConsumer<E> {
    fn clone(&self) -> Self {
        EventConsumer(self.0.clone())
    }
}
