//! HTTP reachability probe (§4.4), grounded on the teacher's
//! `HttpHealthChecker`/`HttpClient` split: a thin trait so the transport can
//! be mocked in tests, with `reqwest::blocking` as the real implementation.

use super::{timed, Prober, ProbeResult};
use crate::config::ProbeTarget;
use crate::error::ProbeError;
use std::time::Duration;

pub trait HttpTransport: Send + Sync {
    fn request(&self, method: &str, url: &str, timeout: Duration) -> Result<u16, ProbeError>;
}

#[derive(Debug, Default)]
pub struct ReqwestTransport;

impl HttpTransport for ReqwestTransport {
    fn request(&self, method: &str, url: &str, timeout: Duration) -> Result<u16, ProbeError> {
        url::Url::parse(url).map_err(|err| ProbeError::Other(format!("invalid probe url: {err}")))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProbeError::Other(err.to_string()))?;

        let method = method
            .parse::<http::Method>()
            .map_err(|err| ProbeError::Other(err.to_string()))?;

        client
            .request(method, url)
            .send()
            .map(|response| response.status().as_u16())
            .map_err(classify_reqwest_error)
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> ProbeError {
    if err.is_timeout() {
        ProbeError::ProbeTimeout
    } else if err.is_connect() {
        ProbeError::ConnectionRefused
    } else {
        ProbeError::Other(err.to_string())
    }
}

pub struct HttpProber<T: HttpTransport = ReqwestTransport> {
    transport: T,
}

impl HttpProber<ReqwestTransport> {
    pub fn new() -> Self {
        Self {
            transport: ReqwestTransport,
        }
    }
}

impl Default for HttpProber<ReqwestTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: HttpTransport> HttpProber<T> {
    pub fn with_transport(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: HttpTransport> Prober for HttpProber<T> {
    fn probe(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult {
        timed(|| {
            let url = format!("http://{}{}", target.address, target.http_path);
            let status = self.transport.request(&target.http_method, &url, timeout)?;
            if status == target.http_expected_status {
                Ok(format!("status {status}"))
            } else {
                Err(ProbeError::Other(format!(
                    "unexpected status {status}, expected {}",
                    target.http_expected_status
                )))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct StubTransport(Mutex<Result<u16, ProbeError>>);

    impl HttpTransport for StubTransport {
        fn request(&self, _method: &str, _url: &str, _timeout: Duration) -> Result<u16, ProbeError> {
            self.0.lock().unwrap().clone()
        }
    }

    fn target() -> ProbeTarget {
        ProbeTarget {
            service_name: "svc".to_string(),
            listener_name: "web".to_string(),
            address: "127.0.0.1:8080".to_string(),
            http_path: "/healthz".to_string(),
            http_method: "GET".to_string(),
            http_expected_status: 200,
            grpc_service: String::new(),
            exec_command: String::new(),
            exec_args: vec![],
            icmp_mode: crate::config::IcmpMode::Auto,
        }
    }

    #[test]
    fn matching_status_is_success() {
        let prober = HttpProber::with_transport(StubTransport(Mutex::new(Ok(200))));
        let result = prober.probe(&target(), Duration::from_secs(1));
        assert!(result.success);
    }

    #[test]
    fn mismatched_status_is_failure() {
        let prober = HttpProber::with_transport(StubTransport(Mutex::new(Ok(500))));
        let result = prober.probe(&target(), Duration::from_secs(1));
        assert!(!result.success);
    }

    #[test]
    fn transport_error_is_failure() {
        let prober =
            HttpProber::with_transport(StubTransport(Mutex::new(Err(ProbeError::ConnectionRefused))));
        let result = prober.probe(&target(), Duration::from_secs(1));
        assert!(!result.success);
        assert_matches::assert_matches!(result.error, Some(ProbeError::ConnectionRefused));
    }

    #[test]
    fn reqwest_transport_against_a_real_server_honours_path_method_and_status() {
        let server = httpmock::MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/healthz");
            then.status(200).body("ok");
        });

        let mut target = target();
        target.address = format!("127.0.0.1:{}", server.port());
        let prober = HttpProber::new();
        let result = prober.probe(&target, Duration::from_secs(2));

        mock.assert();
        assert!(result.success);
    }

    #[test]
    fn reqwest_transport_reports_failure_on_a_status_mismatch() {
        let server = httpmock::MockServer::start();
        server.mock(|when, then| {
            when.method(httpmock::Method::GET).path("/healthz");
            then.status(503);
        });

        let mut target = target();
        target.address = format!("127.0.0.1:{}", server.port());
        let prober = HttpProber::new();
        let result = prober.probe(&target, Duration::from_secs(2));

        assert!(!result.success);
    }
}
