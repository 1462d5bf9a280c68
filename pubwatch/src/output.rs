//! Operator-facing progress output on stdout.

use pubwatch_common::poll::{PollObserver, PollReport, PollTimeoutError};
use pubwatch_common::report::unmet_report;
use pubwatch_common::ArtifactSpec;
use std::cell::RefCell;
use std::io::{self, Write};
use std::time::Duration;

/// Prints a table of unmet artifacts after every round.
pub struct TableObserver<W: Write> {
    out: RefCell<W>,
}

impl TableObserver<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TableObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: RefCell::new(out),
        }
    }

    // Progress output is best effort; a closed stdout must not end the poll.
    fn emit(&self, text: &str) {
        let mut out = self.out.borrow_mut();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    pub fn satisfied(&self, total: usize, report: &PollReport) {
        self.emit(&format!(
            "All {total} artifact(s) for this version were found ({} round(s), {}).\n",
            report.rounds,
            format_secs(report.elapsed)
        ));
    }

    pub fn timed_out(&self, timeout: &PollTimeoutError<ArtifactSpec>) {
        self.emit(&format!(
            "Timed out after {}. Still missing:\n{}",
            format_secs(timeout.elapsed),
            unmet_report(&timeout.unmet)
        ));
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

fn format_secs(d: Duration) -> humantime::FormattedDuration {
    humantime::format_duration(Duration::from_secs(d.as_secs()))
}

impl<W: Write> PollObserver<ArtifactSpec> for TableObserver<W> {
    fn round_started(&self, round: u32, pending: usize) {
        self.emit(&format!("Round {round}: checking {pending} artifact(s) ...\n"));
    }

    fn unmet(&self, _round: u32, unmet: &[ArtifactSpec]) {
        self.emit(&unmet_report(unmet));
    }

    fn sleeping(&self, duration: Duration) {
        self.emit(&format!(
            "--- Waiting {} before retrying ---\n\n",
            format_secs(duration)
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pubwatch_common::{Channel, SnapSpec};

    fn snap() -> ArtifactSpec {
        SnapSpec::new("checkbox22", "1.0", Channel::parse("latest/edge").unwrap(), "arm64").into()
    }

    fn text(observer: TableObserver<Vec<u8>>) -> String {
        String::from_utf8(observer.into_inner()).unwrap()
    }

    #[test]
    fn test_round_output() {
        let observer = TableObserver::new(Vec::new());
        observer.round_started(2, 3);
        observer.unmet(2, &[snap()]);
        observer.sleeping(Duration::from_secs(30));
        let out = text(observer);
        assert!(out.starts_with("Round 2: checking 3 artifact(s) ...\n"));
        assert!(out.contains("checkbox22 | latest/edge | arm64"));
        assert!(out.ends_with("--- Waiting 30s before retrying ---\n\n"));
    }

    #[test]
    fn test_summary_lines() {
        let observer = TableObserver::new(Vec::new());
        observer.satisfied(
            4,
            &PollReport {
                rounds: 3,
                probes: 6,
                elapsed: Duration::from_millis(60_400),
            },
        );
        observer.timed_out(&PollTimeoutError {
            unmet: vec![snap()],
            rounds: 11,
            probes: 11,
            elapsed: Duration::from_secs(300),
        });
        let out = text(observer);
        assert!(out.contains("All 4 artifact(s) for this version were found (3 round(s), 1m)."));
        assert!(out.contains("Timed out after 5m. Still missing:\n1 snap(s)"));
    }
}
