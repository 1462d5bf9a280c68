//! Blocking HTTP transport used by the probers.
//!
//! Probers talk to the network through [`HttpTransport`] so the strategies
//! can be exercised against canned responses in tests.

use std::time::Duration;
use thiserror::Error;
use tracing::trace;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure to obtain any HTTP response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    #[error("failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// Status and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

pub trait HttpTransport {
    /// Issue a `HEAD` request and return the status code.
    fn head(&self, url: &str) -> Result<u16, TransportError>;

    /// Issue a `GET` request with extra headers.
    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn head(&self, url: &str) -> Result<u16, TransportError> {
        (**self).head(url)
    }

    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        (**self).get(url, headers)
    }
}

/// [`HttpTransport`] backed by a `ureq` agent.
///
/// Non-2xx statuses are returned as responses, not errors, so callers can
/// decide which statuses are fatal. Redirects are not followed: a moved
/// pool file reports its 3xx status rather than the target's 200.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    timeout: Duration,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl HttpTransport for UreqTransport {
    fn head(&self, url: &str) -> Result<u16, TransportError> {
        trace!(url, "HEAD");
        let response = self
            .agent
            .head(url)
            .call()
            .map_err(|e| TransportError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(response.status().as_u16())
    }

    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        trace!(url, "GET");
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let mut response = request.call().map_err(|e| TransportError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Body {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(HttpResponse { status, body })
    }
}
