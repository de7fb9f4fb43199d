//! The declarative input data model (§3, §6). Loading and parsing YAML into
//! these types is explicitly out of scope (§1); this module only carries the
//! shapes an external loader is expected to populate, plus the `serde` tag
//! mappings a loader would rely on, the way the teacher's
//! `agent_type::runtime_config` module carries config shapes without owning
//! the file I/O that produces them.

use crate::types::{
    FailureThreshold, ProbeInterval, ProbeTimeout, RestartDelay, StabilityWindow, SuccessThreshold,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Input configuration for one managed service, immutable for the life of
/// the lifecycle manager built from it.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default)]
    pub environment: HashMap<String, String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub oneshot: bool,
    pub restart: RestartConfig,
    #[serde(default)]
    pub listeners: Vec<ListenerConfig>,
}

/// §3 `RestartPolicy`. The string tags match §6's policy mapping exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    Always,
    OnFailure,
    Never,
    UnlessStopped,
}

/// §3 `RestartConfig`. `delay_max` of zero (the `Default`) means flat backoff
/// at `delay` rather than "no backoff", matching §4.1's `NextDelay` rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RestartConfig {
    pub policy: RestartPolicy,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub delay: RestartDelay,
    #[serde(default = "zero_duration")]
    pub delay_max: Duration,
    #[serde(default)]
    pub stability_window: StabilityWindow,
}

fn zero_duration() -> Duration {
    Duration::ZERO
}

impl RestartConfig {
    pub fn max_retries(&self) -> crate::types::MaxRetries {
        self.max_retries.into()
    }
}

/// §3 `ListenerConfig`. `protocol` is the transport the listener binds, not
/// the probe protocol (a TCP listener can still be probed over HTTP).
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    pub name: String,
    pub port: u16,
    pub protocol: ListenerProtocol,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub exposed: bool,
    #[serde(default)]
    pub probe: Option<ProbeConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerProtocol {
    Tcp,
    Udp,
}

/// §4.4 ICMP probing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IcmpMode {
    Native,
    Fallback,
    #[default]
    Auto,
}

/// §3/§6 `ProbeConfig`. Type-specific fields are flattened with defaults so a
/// probe section only needs the fields relevant to its `type` tag.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum ProbeConfig {
    Tcp(ProbeCommon),
    Udp(ProbeCommon),
    Http(HttpProbeConfig),
    Grpc(GrpcProbeConfig),
    Exec(ExecProbeConfig),
    Icmp(IcmpProbeConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeCommon {
    #[serde(default)]
    pub interval: ProbeInterval,
    #[serde(default)]
    pub timeout: ProbeTimeout,
    #[serde(default)]
    pub success_threshold: SuccessThreshold,
    #[serde(default)]
    pub failure_threshold: FailureThreshold,
}

impl ProbeCommon {
    /// §7 validation kinds, consumed at construction: a zero interval or
    /// timeout, or a zero threshold, can never be satisfied by a probe
    /// schedule, so registration rejects it up front rather than scheduling
    /// a scheduler that would tick in a busy loop or never clear a streak.
    pub fn validate(&self) -> Result<(), crate::error::ProbeConfigError> {
        use crate::error::ProbeConfigError;

        if self.interval.get().is_zero() {
            return Err(ProbeConfigError::InvalidInterval(self.interval.get()));
        }
        if self.timeout.get().is_zero() {
            return Err(ProbeConfigError::InvalidTimeout(self.timeout.get()));
        }
        if self.success_threshold.get() == 0 {
            return Err(ProbeConfigError::InvalidSuccessThreshold(
                self.success_threshold.get(),
            ));
        }
        if self.failure_threshold.get() == 0 {
            return Err(ProbeConfigError::InvalidFailureThreshold(
                self.failure_threshold.get(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpProbeConfig {
    #[serde(flatten)]
    pub common: ProbeCommon,
    #[serde(default = "default_http_path")]
    pub path: String,
    #[serde(default = "default_http_method")]
    pub method: String,
    #[serde(default = "default_http_status")]
    pub status_code: u16,
}

fn default_http_path() -> String {
    "/".to_string()
}

fn default_http_method() -> String {
    "GET".to_string()
}

fn default_http_status() -> u16 {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrpcProbeConfig {
    #[serde(flatten)]
    pub common: ProbeCommon,
    #[serde(default)]
    pub service: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecProbeConfig {
    #[serde(flatten)]
    pub common: ProbeCommon,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IcmpProbeConfig {
    #[serde(flatten)]
    pub common: ProbeCommon,
    #[serde(default)]
    pub icmp_mode: IcmpMode,
}

impl ProbeConfig {
    pub fn common(&self) -> &ProbeCommon {
        match self {
            ProbeConfig::Tcp(c) | ProbeConfig::Udp(c) => c,
            ProbeConfig::Http(c) => &c.common,
            ProbeConfig::Grpc(c) => &c.common,
            ProbeConfig::Exec(c) => &c.common,
            ProbeConfig::Icmp(c) => &c.common,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            ProbeConfig::Tcp(_) => "tcp",
            ProbeConfig::Udp(_) => "udp",
            ProbeConfig::Http(_) => "http",
            ProbeConfig::Grpc(_) => "grpc",
            ProbeConfig::Exec(_) => "exec",
            ProbeConfig::Icmp(_) => "icmp",
        }
    }
}

/// §3 `ProbeTarget`, derived from a listener + its probe config at
/// registration time rather than carried in the config itself.
#[derive(Debug, Clone)]
pub struct ProbeTarget {
    pub service_name: String,
    pub listener_name: String,
    pub address: String,
    pub http_path: String,
    pub http_method: String,
    pub http_expected_status: u16,
    pub grpc_service: String,
    pub exec_command: String,
    pub exec_args: Vec<String>,
    pub icmp_mode: IcmpMode,
}

impl ProbeTarget {
    pub fn from_listener(
        service_name: &str,
        listener: &ListenerConfig,
        probe: &ProbeConfig,
    ) -> Self {
        let host = if listener.address.is_empty() {
            "127.0.0.1"
        } else {
            &listener.address
        };
        let address = format!("{host}:{}", listener.port);

        let mut target = ProbeTarget {
            service_name: service_name.to_string(),
            listener_name: listener.name.clone(),
            address,
            http_path: default_http_path(),
            http_method: default_http_method(),
            http_expected_status: default_http_status(),
            grpc_service: String::new(),
            exec_command: String::new(),
            exec_args: Vec::new(),
            icmp_mode: IcmpMode::default(),
        };

        match probe {
            ProbeConfig::Http(c) => {
                target.http_path = c.path.clone();
                target.http_method = c.method.clone();
                target.http_expected_status = c.status_code;
            }
            ProbeConfig::Grpc(c) => target.grpc_service = c.service.clone(),
            ProbeConfig::Exec(c) => {
                target.exec_command = c.command.clone();
                target.exec_args = c.args.clone();
            }
            ProbeConfig::Icmp(c) => target.icmp_mode = c.icmp_mode,
            ProbeConfig::Tcp(_) | ProbeConfig::Udp(_) => {}
        }

        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_tags_match_the_external_mapping() {
        assert_eq!(
            serde_plain_policy("always"),
            RestartPolicy::Always
        );
        assert_eq!(
            serde_plain_policy("on-failure"),
            RestartPolicy::OnFailure
        );
        assert_eq!(serde_plain_policy("never"), RestartPolicy::Never);
        assert_eq!(
            serde_plain_policy("unless-stopped"),
            RestartPolicy::UnlessStopped
        );
    }

    fn serde_plain_policy(tag: &str) -> RestartPolicy {
        use serde::de::value::{Error, StrDeserializer};
        RestartPolicy::deserialize(StrDeserializer::<Error>::new(tag)).unwrap()
    }

    #[test]
    fn zero_interval_fails_validation() {
        let common = ProbeCommon {
            interval: Duration::ZERO.into(),
            timeout: ProbeTimeout::default(),
            success_threshold: SuccessThreshold::default(),
            failure_threshold: FailureThreshold::default(),
        };
        assert_eq!(
            common.validate().unwrap_err(),
            crate::error::ProbeConfigError::InvalidInterval(Duration::ZERO)
        );
    }

    #[test]
    fn zero_failure_threshold_fails_validation() {
        let common = ProbeCommon {
            interval: ProbeInterval::default(),
            timeout: ProbeTimeout::default(),
            success_threshold: SuccessThreshold::default(),
            failure_threshold: 0u32.into(),
        };
        assert_eq!(
            common.validate().unwrap_err(),
            crate::error::ProbeConfigError::InvalidFailureThreshold(0)
        );
    }

    #[test]
    fn defaults_pass_validation() {
        let common = ProbeCommon {
            interval: ProbeInterval::default(),
            timeout: ProbeTimeout::default(),
            success_threshold: SuccessThreshold::default(),
            failure_threshold: FailureThreshold::default(),
        };
        assert!(common.validate().is_ok());
    }

    #[test]
    fn probe_target_picks_up_http_fields() {
        let listener = ListenerConfig {
            name: "web".to_string(),
            port: 8080,
            protocol: ListenerProtocol::Tcp,
            address: String::new(),
            exposed: true,
            probe: None,
        };
        let probe = ProbeConfig::Http(HttpProbeConfig {
            common: ProbeCommon {
                interval: ProbeInterval::default(),
                timeout: ProbeTimeout::default(),
                success_threshold: SuccessThreshold::default(),
                failure_threshold: FailureThreshold::default(),
            },
            path: "/healthz".to_string(),
            method: "GET".to_string(),
            status_code: 200,
        });

        let target = ProbeTarget::from_listener("svc", &listener, &probe);
        assert_eq!(target.address, "127.0.0.1:8080");
        assert_eq!(target.http_path, "/healthz");
    }
}
