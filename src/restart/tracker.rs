//! Attempt counter, exponential backoff, and stability-reset window (§4.1).
//!
//! Grounded on the teacher's `Backoff`/`BackoffStrategy` shape in
//! `sub_agent::on_host::command::restart_policy`: a tries counter, an
//! initial delay, a max-retries ceiling, and a reset trigger. The reset
//! trigger is the one deliberate departure (§9 "required re-architecture" is
//! silent on this, but the source ambiguity callout is direct): the teacher
//! resets `tries` when wall-clock time since the *last* retry exceeds a
//! threshold, which conflates "the process has been retried a while ago"
//! with "the process ran stably". This tracker resets only when the caller
//! reports a child *uptime* at or above `StabilityWindow`, via
//! [`RestartTracker::maybe_reset`], which the lifecycle manager calls with
//! the measured lifetime of the exited child rather than a timer since the
//! last attempt.

use crate::config::{RestartConfig, RestartPolicy};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    max_retries: u32,
    delay: Duration,
    delay_max: Duration,
    stability_window: Duration,
    attempts: u32,
}

impl RestartTracker {
    pub fn new(config: &RestartConfig) -> Self {
        Self {
            policy: config.policy,
            max_retries: config.max_retries,
            delay: config.delay.get(),
            delay_max: config.delay_max,
            stability_window: config.stability_window.get(),
            attempts: 0,
        }
    }

    /// §4.1 `ShouldRestart(exitCode)`.
    pub fn should_restart(&self, exit_code: i32) -> bool {
        match self.policy {
            RestartPolicy::Never => false,
            RestartPolicy::UnlessStopped => true,
            RestartPolicy::OnFailure => exit_code != 0 && self.attempts < self.max_retries,
            RestartPolicy::Always => self.attempts < self.max_retries,
        }
    }

    /// §4.1 `RecordAttempt()`.
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// §4.1 `NextDelay()`. `delay_max` of zero means flat backoff at `delay`;
    /// otherwise the k-th call after `k` recorded attempts returns
    /// `min(delay * 2^(k-1), delay_max)`.
    pub fn next_delay(&self) -> Duration {
        if self.delay_max.is_zero() {
            return self.delay;
        }
        let exponent = self.attempts.saturating_sub(1);
        let factor = 2u32.saturating_pow(exponent);
        let grown = self.delay.saturating_mul(factor);
        grown.min(self.delay_max)
    }

    /// §4.1 `MaybeReset(uptime)`.
    pub fn maybe_reset(&mut self, uptime: Duration) {
        if uptime >= self.stability_window {
            self.attempts = 0;
        }
    }

    /// §4.1 `IsExhausted()`. Meaningful for `Always`/`OnFailure`; always
    /// false for `Never` (never attempts) and `UnlessStopped` (no ceiling).
    pub fn is_exhausted(&self) -> bool {
        matches!(self.policy, RestartPolicy::Always | RestartPolicy::OnFailure)
            && self.attempts >= self.max_retries
    }

    /// §4.1 `Attempts()`.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> RestartPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RestartDelay, StabilityWindow};

    fn config(
        policy: RestartPolicy,
        max_retries: u32,
        delay: Duration,
        delay_max: Duration,
    ) -> RestartConfig {
        RestartConfig {
            policy,
            max_retries,
            delay: RestartDelay::from(delay),
            delay_max,
            stability_window: StabilityWindow::from(Duration::from_secs(5 * 60)),
        }
    }

    #[test]
    fn attempts_cap_at_max_retries_absent_reset() {
        let mut tracker = RestartTracker::new(&config(
            RestartPolicy::OnFailure,
            3,
            Duration::from_millis(10),
            Duration::ZERO,
        ));

        for _ in 0..10 {
            if tracker.should_restart(1) {
                tracker.record_attempt();
            }
        }

        assert_eq!(tracker.attempts(), 3);
        assert!(tracker.is_exhausted());
    }

    #[test]
    fn flat_backoff_when_delay_max_is_zero() {
        let mut tracker = RestartTracker::new(&config(
            RestartPolicy::Always,
            10,
            Duration::from_millis(10),
            Duration::ZERO,
        ));

        for _ in 0..5 {
            tracker.record_attempt();
            assert_eq!(tracker.next_delay(), Duration::from_millis(10));
        }
    }

    #[test]
    fn exponential_backoff_capped_at_delay_max() {
        let mut tracker = RestartTracker::new(&config(
            RestartPolicy::Always,
            10,
            Duration::from_millis(10),
            Duration::from_millis(100),
        ));

        let expected = [10, 20, 40, 80, 100, 100];
        for expected_ms in expected {
            tracker.record_attempt();
            assert_eq!(tracker.next_delay(), Duration::from_millis(expected_ms));
        }
    }

    #[test]
    fn maybe_reset_zeroes_attempts_once_uptime_reaches_stability_window() {
        let mut tracker = RestartTracker::new(&config(
            RestartPolicy::OnFailure,
            3,
            Duration::from_millis(10),
            Duration::ZERO,
        ));
        tracker.record_attempt();
        tracker.record_attempt();
        assert_eq!(tracker.attempts(), 2);

        tracker.maybe_reset(Duration::from_millis(1));
        assert_eq!(tracker.attempts(), 2, "short uptime must not reset");

        let mut stable_tracker = tracker.clone();
        stable_tracker.maybe_reset(Duration::from_secs(5 * 60));
        assert_eq!(stable_tracker.attempts(), 0);
    }

    #[test]
    fn never_policy_never_restarts() {
        let tracker = RestartTracker::new(&config(
            RestartPolicy::Never,
            3,
            Duration::from_millis(10),
            Duration::ZERO,
        ));
        assert!(!tracker.should_restart(0));
        assert!(!tracker.should_restart(1));
        assert!(!tracker.is_exhausted());
    }

    #[test]
    fn unless_stopped_ignores_the_ceiling() {
        let mut tracker = RestartTracker::new(&config(
            RestartPolicy::UnlessStopped,
            0,
            Duration::from_millis(1),
            Duration::ZERO,
        ));
        for _ in 0..100 {
            assert!(tracker.should_restart(0));
            tracker.record_attempt();
        }
        assert!(!tracker.is_exhausted());
    }

    #[test]
    fn always_restart_on_clean_exit_while_attempts_remain() {
        let tracker = RestartTracker::new(&config(
            RestartPolicy::Always,
            2,
            Duration::from_millis(10),
            Duration::ZERO,
        ));
        assert!(tracker.should_restart(0));
    }

    #[test]
    fn on_failure_does_not_restart_clean_exit() {
        let tracker = RestartTracker::new(&config(
            RestartPolicy::OnFailure,
            3,
            Duration::from_millis(10),
            Duration::ZERO,
        ));
        assert!(!tracker.should_restart(0));
    }

    #[rstest::rstest]
    #[case::always_clean_exit_restarts(RestartPolicy::Always, 0, true)]
    #[case::always_failure_restarts(RestartPolicy::Always, 1, true)]
    #[case::on_failure_clean_exit_does_not_restart(RestartPolicy::OnFailure, 0, false)]
    #[case::on_failure_failure_restarts(RestartPolicy::OnFailure, 1, true)]
    #[case::never_clean_exit_does_not_restart(RestartPolicy::Never, 0, false)]
    #[case::never_failure_does_not_restart(RestartPolicy::Never, 1, false)]
    #[case::unless_stopped_clean_exit_restarts(RestartPolicy::UnlessStopped, 0, true)]
    #[case::unless_stopped_failure_restarts(RestartPolicy::UnlessStopped, 1, true)]
    fn should_restart_matches_the_policy_table(
        #[case] policy: RestartPolicy,
        #[case] exit_code: i32,
        #[case] expected: bool,
    ) {
        let tracker = RestartTracker::new(&config(
            policy,
            3,
            Duration::from_millis(10),
            Duration::ZERO,
        ));
        assert_eq!(tracker.should_restart(exit_code), expected);
    }
}
