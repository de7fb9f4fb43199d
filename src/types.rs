//! Typed time and count quantities with parsing/formatting, the way the
//! teacher models `HealthCheckInterval`/`HealthCheckTimeout`/`MaxRetries` in
//! `agent_type::runtime_config`: a `Copy` newtype over the primitive, a
//! `Default` that inlines the documented default (§6), and `serde::Deserialize`
//! via `duration_str` for the duration-typed ones.
//!
//! The teacher derives these with a `WrapperWithDefault` proc-macro from a
//! sibling crate; that macro's implementation isn't part of the retrieved
//! corpus, so the `Default` impls here are written out by hand instead (see
//! DESIGN.md).

use duration_str::deserialize_duration;
use serde::Deserialize;
use std::time::Duration;

macro_rules! duration_wrapper {
    ($name:ident, $default:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name(#[serde(deserialize_with = "deserialize_duration")] Duration);

        impl $name {
            pub fn new(value: Duration) -> Self {
                Self(value)
            }

            pub fn get(self) -> Duration {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self($default)
            }
        }

        impl From<$name> for Duration {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl From<Duration> for $name {
            fn from(value: Duration) -> Self {
                Self(value)
            }
        }
    };
}

duration_wrapper!(
    ProbeInterval,
    Duration::from_secs(10),
    "Time between successive probes for a single listener. Default 10s."
);
duration_wrapper!(
    ProbeTimeout,
    Duration::from_secs(5),
    "Per-probe deadline; also the internal deadline the prober itself enforces. Default 5s."
);
duration_wrapper!(
    RestartDelay,
    Duration::from_secs(5),
    "Initial restart backoff delay. Default 5s."
);
duration_wrapper!(
    StabilityWindow,
    Duration::from_secs(5 * 60),
    "Minimum uptime that resets the restart attempt counter. Default 5 minutes."
);
duration_wrapper!(
    ManagerStopTimeout,
    Duration::from_secs(30),
    "Deadline for graceful process termination on Stop(). Default 30s."
);

macro_rules! count_wrapper {
    ($name:ident, $inner:ty, $default:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name($inner);

        impl $name {
            pub fn new(value: $inner) -> Self {
                Self(value)
            }

            pub fn get(self) -> $inner {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self($default)
            }
        }

        impl From<$name> for $inner {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }
    };
}

count_wrapper!(
    MaxRetries,
    u32,
    3,
    "Ceiling on restart attempts for bounded policies. Default 3."
);
count_wrapper!(
    SuccessThreshold,
    u32,
    1,
    "Consecutive successes required to clear an unhealthy streak. Default 1."
);
count_wrapper!(
    FailureThreshold,
    u32,
    3,
    "Consecutive failures required to trigger the liveness callback. Default 3."
);
count_wrapper!(
    EventBufferSize,
    usize,
    16,
    "Capacity of a manager's or monitor's bounded event channel. Default 16."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_table() {
        assert_eq!(ProbeInterval::default().get(), Duration::from_secs(10));
        assert_eq!(ProbeTimeout::default().get(), Duration::from_secs(5));
        assert_eq!(RestartDelay::default().get(), Duration::from_secs(5));
        assert_eq!(
            StabilityWindow::default().get(),
            Duration::from_secs(5 * 60)
        );
        assert_eq!(ManagerStopTimeout::default().get(), Duration::from_secs(30));
        assert_eq!(MaxRetries::default().get(), 3);
        assert_eq!(SuccessThreshold::default().get(), 1);
        assert_eq!(FailureThreshold::default().get(), 3);
        assert_eq!(EventBufferSize::default().get(), 16);
    }

    #[test]
    fn deserializes_human_readable_durations() {
        use serde::de::value::{Error, MapDeserializer};

        #[derive(Deserialize)]
        struct Wrapped {
            interval: ProbeInterval,
        }

        let parsed = Wrapped::deserialize(MapDeserializer::<_, Error>::new(
            std::iter::once(("interval", "15s")),
        ))
        .unwrap();
        assert_eq!(parsed.interval.get(), Duration::from_secs(15));
    }
}
