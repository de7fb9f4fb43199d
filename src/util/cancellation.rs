use super::channel::EventConsumer;
use crossbeam::channel::RecvTimeoutError;
use std::time::Duration;

pub type CancellationMessage = ();

impl EventConsumer<CancellationMessage> {
    /// Returns true if a cancellation message (or a disconnect) was observed
    /// before `timeout` elapsed. Otherwise blocks for `timeout` and returns
    /// false. This is the sleep primitive every cancellable loop polls on:
    /// the restart delay, the probe interval, and the exit-or-shutdown wait.
    pub fn is_cancelled(&self, timeout: Duration) -> bool {
        let timed_out = matches!(
            self.as_ref().recv_timeout(timeout),
            Err(RecvTimeoutError::Timeout)
        );
        !timed_out
    }
}
