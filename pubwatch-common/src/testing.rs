//! Test doubles shared by unit and integration tests.
//!
//! Nothing here touches the network or sleeps for real.

use crate::poll::{CancelToken, Clock};
use crate::probe::{HttpResponse, HttpTransport, ProbeError, Prober, TransportError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::{Duration, Instant};

static TEST_LOGGING_INIT: Once = Once::new();

/// Install a test-writer subscriber once per process.
///
/// Honours `RUST_LOG`, defaulting to `debug` for pubwatch targets.
pub fn init_test_logging() {
    TEST_LOGGING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("pubwatch=debug,pubwatch_common=debug")
        });
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Clock that only moves when the engine sleeps or a test advances it.
#[derive(Debug, Clone)]
pub struct MockClock {
    origin: Instant,
    elapsed_nanos: Arc<AtomicU64>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl MockClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed_nanos: Arc::new(AtomicU64::new(0)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.elapsed_nanos.fetch_add(nanos, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.elapsed_nanos.load(Ordering::SeqCst))
    }

    /// Every completed sleep, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        self.advance(duration);
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        true
    }
}

/// Prober answering from per-spec scripts.
///
/// A script's last answer repeats once it is exhausted. Unscripted specs
/// are never available.
#[derive(Debug)]
pub struct ScriptedProber<S> {
    scripts: RefCell<HashMap<S, Vec<Result<bool, ProbeError>>>>,
    calls: RefCell<Vec<S>>,
}

impl<S: Clone + Eq + Hash> ScriptedProber<S> {
    pub fn new() -> Self {
        Self {
            scripts: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn always(self, spec: S, available: bool) -> Self {
        self.script(spec, [available])
    }

    pub fn script(self, spec: S, answers: impl IntoIterator<Item = bool>) -> Self {
        self.scripts
            .borrow_mut()
            .insert(spec, answers.into_iter().map(Ok).collect());
        self
    }

    pub fn fail(self, spec: S, error: ProbeError) -> Self {
        self.scripts.borrow_mut().insert(spec, vec![Err(error)]);
        self
    }

    pub fn calls(&self) -> Vec<S> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, spec: &S) -> usize {
        self.calls.borrow().iter().filter(|s| *s == spec).count()
    }
}

impl<S: Clone + Eq + Hash> Default for ScriptedProber<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Eq + Hash> Prober<S> for ScriptedProber<S> {
    fn is_available(&self, spec: &S) -> Result<bool, ProbeError> {
        self.calls.borrow_mut().push(spec.clone());
        let mut scripts = self.scripts.borrow_mut();
        match scripts.get_mut(spec) {
            Some(answers) if answers.len() > 1 => answers.remove(0),
            Some(answers) => answers.first().cloned().unwrap_or(Ok(false)),
            None => Ok(false),
        }
    }
}

/// Transport answering from canned responses keyed by URL.
///
/// Unknown URLs fail with [`TransportError::Request`], which is how a
/// refused connection looks to the probers.
#[derive(Debug, Default)]
pub struct MockTransport {
    heads: HashMap<String, u16>,
    gets: HashMap<String, HttpResponse>,
    requests: RefCell<Vec<String>>,
    last_headers: RefCell<Vec<(String, String)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_head(mut self, url: impl Into<String>, status: u16) -> Self {
        self.heads.insert(url.into(), status);
        self
    }

    pub fn with_get(
        mut self,
        url: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        self.gets.insert(
            url.into(),
            HttpResponse {
                status,
                body: body.into(),
            },
        );
        self
    }

    /// Requests seen so far as `"METHOD url"`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    /// Headers of the most recent `GET`.
    pub fn last_headers(&self) -> Vec<(String, String)> {
        self.last_headers.borrow().clone()
    }

    fn refused(url: &str) -> TransportError {
        TransportError::Request {
            url: url.to_string(),
            reason: "connection refused".to_string(),
        }
    }
}

impl HttpTransport for MockTransport {
    fn head(&self, url: &str) -> Result<u16, TransportError> {
        self.requests.borrow_mut().push(format!("HEAD {url}"));
        self.heads.get(url).copied().ok_or_else(|| Self::refused(url))
    }

    fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(format!("GET {url}"));
        *self.last_headers.borrow_mut() = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.gets.get(url).cloned().ok_or_else(|| Self::refused(url))
    }
}
