//! Polling engine.
//!
//! [`Poller::await_all`] probes every pending spec once per round, remembers
//! what it found, and sleeps a fixed interval between rounds until either
//! everything is published or the deadline passes.

use crate::probe::{ProbeError, Prober};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default overall deadline.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Default pause between rounds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Granularity at which [`SystemClock::sleep`] checks for cancellation.
const SLEEP_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Deadline measured from the start of the first round.
    pub timeout: Duration,
    /// Fixed pause between rounds (clamped to the remaining time).
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_POLL_TIMEOUT,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollConfig {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }

    /// Upper bound on how often a single spec is probed.
    pub fn max_probes_per_spec(&self) -> u64 {
        let interval = self.interval.as_nanos().max(1);
        let rounds = self.timeout.as_nanos().div_ceil(interval);
        u64::try_from(rounds).unwrap_or(u64::MAX).saturating_add(1)
    }
}

/// Terminal state of a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Satisfied,
    TimedOut,
    Cancelled,
    Aborted,
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => write!(f, "satisfied"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// Shared flag that ends a poll at its next check.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Time source for the engine.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Block for `duration`. Returns `false` if `cancel` fired first.
    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        (**self).sleep(duration, cancel)
    }
}

/// Wall clock with a sliced, cancellable sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
        let end = Instant::now() + duration;
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= end {
                return true;
            }
            std::thread::sleep((end - now).min(SLEEP_SLICE));
        }
    }
}

/// Found/not-found state of every spec in one poll.
///
/// Duplicates collapse to their first occurrence. Once a spec is found it
/// stays found.
#[derive(Debug, Clone)]
pub struct AvailabilityState<S> {
    specs: Vec<S>,
    found: HashSet<S>,
}

impl<S: Clone + Eq + Hash> AvailabilityState<S> {
    pub fn new(specs: impl IntoIterator<Item = S>) -> Self {
        let mut seen = HashSet::new();
        let specs = specs
            .into_iter()
            .filter(|spec| seen.insert(spec.clone()))
            .collect();
        Self {
            specs,
            found: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn is_found(&self, spec: &S) -> bool {
        self.found.contains(spec)
    }

    pub fn mark_found(&mut self, spec: &S) {
        self.found.insert(spec.clone());
    }

    pub fn found_count(&self) -> usize {
        self.found.len()
    }

    pub fn all_found(&self) -> bool {
        self.found.len() == self.specs.len()
    }

    /// Specs still missing, in input order.
    pub fn pending(&self) -> impl Iterator<Item = &S> {
        self.specs.iter().filter(|spec| !self.found.contains(*spec))
    }

    pub fn unmet(&self) -> Vec<S> {
        self.pending().cloned().collect()
    }
}

/// Hooks for operator-facing output. All methods default to no-ops.
pub trait PollObserver<S> {
    fn round_started(&self, _round: u32, _pending: usize) {}

    fn found(&self, _spec: &S) {}

    /// Called after every round that leaves specs unmet.
    fn unmet(&self, _round: u32, _unmet: &[S]) {}

    fn sleeping(&self, _duration: Duration) {}
}

impl<S, O: PollObserver<S> + ?Sized> PollObserver<S> for &O {
    fn round_started(&self, round: u32, pending: usize) {
        (**self).round_started(round, pending)
    }

    fn found(&self, spec: &S) {
        (**self).found(spec)
    }

    fn unmet(&self, round: u32, unmet: &[S]) {
        (**self).unmet(round, unmet)
    }

    fn sleeping(&self, duration: Duration) {
        (**self).sleeping(duration)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl<S> PollObserver<S> for SilentObserver {}

/// Summary of a successful poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub rounds: u32,
    pub probes: u64,
    pub elapsed: Duration,
}

/// Deadline passed with specs still unmet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTimeoutError<S> {
    pub unmet: Vec<S>,
    pub rounds: u32,
    pub probes: u64,
    pub elapsed: Duration,
}

impl<S> fmt::Display for PollTimeoutError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} artifact(s) still unavailable after {} ({} rounds)",
            self.unmet.len(),
            humantime::format_duration(round_to_millis(self.elapsed)),
            self.rounds
        )
    }
}

impl<S: fmt::Debug> std::error::Error for PollTimeoutError<S> {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollError<S> {
    Timeout(PollTimeoutError<S>),
    /// A prober reported a hard failure.
    Remote(ProbeError),
    Cancelled { rounds: u32 },
}

impl<S> PollError<S> {
    pub fn status(&self) -> PollStatus {
        match self {
            Self::Timeout(_) => PollStatus::TimedOut,
            Self::Remote(_) => PollStatus::Aborted,
            Self::Cancelled { .. } => PollStatus::Cancelled,
        }
    }
}

impl<S> fmt::Display for PollError<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(e) => write!(f, "timed out: {e}"),
            Self::Remote(e) => write!(f, "poll aborted: {e}"),
            Self::Cancelled { rounds } => write!(f, "poll cancelled after {rounds} rounds"),
        }
    }
}

impl<S: fmt::Debug + 'static> std::error::Error for PollError<S> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timeout(e) => Some(e),
            Self::Remote(e) => Some(e),
            Self::Cancelled { .. } => None,
        }
    }
}

impl<S> From<ProbeError> for PollError<S> {
    fn from(e: ProbeError) -> Self {
        Self::Remote(e)
    }
}

fn round_to_millis(d: Duration) -> Duration {
    Duration::from_millis(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Drives one prober until every spec is available.
pub struct Poller<P, C = SystemClock, O = SilentObserver> {
    prober: P,
    clock: C,
    observer: O,
    config: PollConfig,
    cancel: CancelToken,
}

impl<P> Poller<P> {
    pub fn new(prober: P, config: PollConfig) -> Self {
        Self {
            prober,
            clock: SystemClock,
            observer: SilentObserver,
            config,
            cancel: CancelToken::new(),
        }
    }
}

impl<P, C, O> Poller<P, C, O> {
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Poller<P, C2, O> {
        Poller {
            prober: self.prober,
            clock,
            observer: self.observer,
            config: self.config,
            cancel: self.cancel,
        }
    }

    pub fn with_observer<O2>(self, observer: O2) -> Poller<P, C, O2> {
        Poller {
            prober: self.prober,
            clock: self.clock,
            observer,
            config: self.config,
            cancel: self.cancel,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl<P, C: Clock, O> Poller<P, C, O> {
    /// Poll until every spec in `specs` is available.
    ///
    /// An empty input returns at once without probing or sleeping. A hard
    /// probe failure ends the poll immediately.
    pub fn await_all<S>(&self, specs: &[S]) -> Result<PollReport, PollError<S>>
    where
        S: Clone + Eq + Hash + fmt::Display,
        P: Prober<S>,
        O: PollObserver<S>,
    {
        let start = self.clock.now();
        // A timeout too large for `Instant` means no deadline.
        let deadline = start.checked_add(self.config.timeout);
        let mut state = AvailabilityState::new(specs.iter().cloned());
        let mut report = PollReport::default();

        if state.is_empty() {
            info!("Nothing to wait for");
            return Ok(report);
        }

        info!(
            specs = state.len(),
            timeout_secs = self.config.timeout.as_secs_f64(),
            interval_secs = self.config.interval.as_secs_f64(),
            "Waiting for artifacts"
        );

        loop {
            if self.cancel.is_cancelled() {
                warn!(rounds = report.rounds, "Poll cancelled");
                return Err(PollError::Cancelled {
                    rounds: report.rounds,
                });
            }

            report.rounds += 1;
            let round = report.rounds;
            let pending = state.unmet();
            self.observer.round_started(round, pending.len());
            debug!(round, pending = pending.len(), "Starting poll round");

            for spec in &pending {
                report.probes += 1;
                match self.prober.is_available(spec) {
                    Ok(true) => {
                        debug!(round, spec = %spec, "Artifact available");
                        state.mark_found(spec);
                        self.observer.found(spec);
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(round, spec = %spec, error = %e, "Poll aborted");
                        return Err(PollError::Remote(e));
                    }
                }
            }

            let now = self.clock.now();
            report.elapsed = now.saturating_duration_since(start);

            if state.all_found() {
                info!(
                    rounds = report.rounds,
                    probes = report.probes,
                    elapsed_secs = report.elapsed.as_secs_f64(),
                    "All artifacts available"
                );
                return Ok(report);
            }

            let unmet = state.unmet();
            info!(
                round,
                found = state.found_count(),
                unmet = unmet.len(),
                "Artifacts still missing"
            );
            self.observer.unmet(round, &unmet);

            if deadline.is_some_and(|deadline| now >= deadline) {
                warn!(
                    rounds = report.rounds,
                    unmet = unmet.len(),
                    "Timed out waiting for artifacts"
                );
                return Err(PollError::Timeout(PollTimeoutError {
                    unmet,
                    rounds: report.rounds,
                    probes: report.probes,
                    elapsed: report.elapsed,
                }));
            }

            let wait = match deadline {
                Some(deadline) => self.config.interval.min(deadline - now),
                None => self.config.interval,
            };
            self.observer.sleeping(wait);
            debug!(wait_secs = wait.as_secs_f64(), "Sleeping before next round");
            if !self.clock.sleep(wait, &self.cancel) {
                warn!(rounds = report.rounds, "Poll cancelled while sleeping");
                return Err(PollError::Cancelled {
                    rounds: report.rounds,
                });
            }
        }
    }
}

/// Poll `specs` with the wall clock and no observer.
pub fn await_all<S, P>(
    specs: &[S],
    prober: P,
    config: PollConfig,
) -> Result<PollReport, PollError<S>>
where
    S: Clone + Eq + Hash + fmt::Display,
    P: Prober<S>,
{
    Poller::new(prober, config).await_all(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockClock, ScriptedProber};
    use std::cell::RefCell;

    fn config(timeout: u64, interval: u64) -> PollConfig {
        PollConfig::new(Duration::from_secs(timeout), Duration::from_secs(interval))
    }

    // =========================================================================
    // Config
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = PollConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.max_probes_per_spec(), 11);
    }

    #[test]
    fn test_max_probes_rounds_up() {
        assert_eq!(config(10, 3).max_probes_per_spec(), 5);
        assert_eq!(config(0, 3).max_probes_per_spec(), 1);
        assert_eq!(config(9, 3).max_probes_per_spec(), 4);
    }

    // =========================================================================
    // State
    // =========================================================================

    #[test]
    fn test_state_dedups_and_keeps_order() {
        let mut state = AvailabilityState::new(["b", "a", "b", "c"]);
        assert_eq!(state.len(), 3);
        assert_eq!(state.unmet(), vec!["b", "a", "c"]);
        state.mark_found(&"a");
        assert!(state.is_found(&"a"));
        assert_eq!(state.unmet(), vec!["b", "c"]);
        assert!(!state.all_found());
    }

    // =========================================================================
    // Engine
    // =========================================================================

    #[test]
    fn test_empty_input_returns_immediately() {
        let prober = ScriptedProber::<&str>::new();
        let clock = MockClock::new();
        let report = Poller::new(&prober, config(300, 30))
            .with_clock(&clock)
            .await_all::<&str>(&[])
            .unwrap();
        assert_eq!(report, PollReport::default());
        assert!(prober.calls().is_empty());
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_all_found_first_round_never_sleeps() {
        let prober = ScriptedProber::new().always("a", true).always("b", true);
        let clock = MockClock::new();
        let report = Poller::new(&prober, config(300, 30))
            .with_clock(&clock)
            .await_all(&["a", "b"])
            .unwrap();
        assert_eq!(report.rounds, 1);
        assert_eq!(report.probes, 2);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_found_specs_are_not_probed_again() {
        let prober = ScriptedProber::new()
            .always("a", true)
            .script("b", [false, false, true]);
        let clock = MockClock::new();
        let report = Poller::new(&prober, config(300, 30))
            .with_clock(&clock)
            .await_all(&["a", "b"])
            .unwrap();
        assert_eq!(prober.count(&"a"), 1);
        assert_eq!(prober.count(&"b"), 3);
        assert_eq!(report.rounds, 3);
        assert_eq!(report.probes, 4);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(30); 2]);
    }

    #[test]
    fn test_timeout_reports_unmet() {
        let prober = ScriptedProber::new().always("a", true).always("b", false);
        let clock = MockClock::new();
        let err = Poller::new(&prober, config(100, 30))
            .with_clock(&clock)
            .await_all(&["a", "b"])
            .unwrap_err();
        let PollError::Timeout(timeout) = err else {
            panic!("expected timeout, got {err:?}");
        };
        assert_eq!(timeout.unmet, vec!["b"]);
        assert!(timeout.elapsed >= Duration::from_secs(100));
        // Rounds at 0, 30, 60, 90 and a final one clamped to 100.
        assert_eq!(timeout.rounds, 5);
        assert_eq!(prober.count(&"b"), 5);
        assert!(prober.count(&"b") as u64 <= config(100, 30).max_probes_per_spec());
        assert_eq!(clock.sleeps().last(), Some(&Duration::from_secs(10)));
    }

    #[test]
    fn test_zero_timeout_runs_one_round() {
        let prober = ScriptedProber::new().always("a", false);
        let clock = MockClock::new();
        let err = Poller::new(&prober, config(0, 30))
            .with_clock(&clock)
            .await_all(&["a"])
            .unwrap_err();
        assert_eq!(err.status(), PollStatus::TimedOut);
        assert_eq!(prober.count(&"a"), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_unrepresentable_timeout_polls_without_deadline() {
        let prober = ScriptedProber::new().script("a", [false, false, true]);
        let clock = MockClock::new();
        let report = Poller::new(&prober, PollConfig::new(Duration::MAX, Duration::from_secs(30)))
            .with_clock(&clock)
            .await_all(&["a"])
            .unwrap();
        assert_eq!(report.rounds, 3);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(30); 2]);
    }

    #[test]
    fn test_max_settings_timeout_does_not_overflow() {
        let prober = ScriptedProber::new().always("a", true);
        let config = PollConfig::new(Duration::from_secs(u64::MAX), Duration::from_secs(30));
        let report = Poller::new(&prober, config).await_all(&["a"]).unwrap();
        assert_eq!(report.rounds, 1);
    }

    #[test]
    fn test_hard_failure_aborts() {
        let failure = ProbeError::Remote {
            name: "bad".into(),
            status: 404,
        };
        let prober = ScriptedProber::new()
            .fail("bad", failure.clone())
            .always("good", false);
        let clock = MockClock::new();
        let err = Poller::new(&prober, config(300, 30))
            .with_clock(&clock)
            .await_all(&["bad", "good"])
            .unwrap_err();
        assert_eq!(err, PollError::Remote(failure));
        assert_eq!(prober.count(&"good"), 0);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_cancel_before_start() {
        let prober = ScriptedProber::new().always("a", true);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = Poller::new(&prober, config(300, 30))
            .with_clock(MockClock::new())
            .with_cancel(cancel)
            .await_all(&["a"])
            .unwrap_err();
        assert_eq!(err, PollError::Cancelled { rounds: 0 });
        assert!(prober.calls().is_empty());
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        struct CancelOnUnmet(CancelToken);

        impl PollObserver<&'static str> for CancelOnUnmet {
            fn unmet(&self, _round: u32, _unmet: &[&'static str]) {
                self.0.cancel();
            }
        }

        let prober = ScriptedProber::new().always("a", false);
        let cancel = CancelToken::new();
        let clock = MockClock::new();
        let err = Poller::new(&prober, config(300, 30))
            .with_clock(&clock)
            .with_observer(CancelOnUnmet(cancel.clone()))
            .with_cancel(cancel)
            .await_all(&["a"])
            .unwrap_err();
        assert_eq!(err.status(), PollStatus::Cancelled);
        assert_eq!(prober.count(&"a"), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[test]
    fn test_observer_sees_rounds() {
        #[derive(Default)]
        struct Recorder {
            events: RefCell<Vec<String>>,
        }

        impl PollObserver<&'static str> for Recorder {
            fn round_started(&self, round: u32, pending: usize) {
                self.events.borrow_mut().push(format!("round {round} ({pending})"));
            }
            fn found(&self, spec: &&'static str) {
                self.events.borrow_mut().push(format!("found {spec}"));
            }
            fn unmet(&self, _round: u32, unmet: &[&'static str]) {
                self.events.borrow_mut().push(format!("unmet {}", unmet.join(",")));
            }
            fn sleeping(&self, duration: Duration) {
                self.events.borrow_mut().push(format!("sleep {}", duration.as_secs()));
            }
        }

        let prober = ScriptedProber::new()
            .always("a", true)
            .script("b", [false, true]);
        let recorder = Recorder::default();
        Poller::new(&prober, config(300, 30))
            .with_clock(MockClock::new())
            .with_observer(&recorder)
            .await_all(&["a", "b"])
            .unwrap();
        assert_eq!(
            *recorder.events.borrow(),
            vec![
                "round 1 (2)",
                "found a",
                "unmet b",
                "sleep 30",
                "round 2 (1)",
                "found b",
            ]
        );
    }

    #[test]
    fn test_system_clock_sleep_observes_cancel() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let start = Instant::now();
        assert!(!SystemClock.sleep(Duration::from_secs(5), &cancel));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(SystemClock.sleep(Duration::from_millis(1), &CancelToken::new()));
    }

    #[test]
    fn test_error_display() {
        let err: PollError<&str> = PollError::Timeout(PollTimeoutError {
            unmet: vec!["a", "b"],
            rounds: 3,
            probes: 5,
            elapsed: Duration::from_secs(60),
        });
        assert_eq!(
            err.to_string(),
            "timed out: 2 artifact(s) still unavailable after 1m (3 rounds)"
        );
        let cancelled: PollError<&str> = PollError::Cancelled { rounds: 2 };
        assert_eq!(cancelled.to_string(), "poll cancelled after 2 rounds");
    }
}
