//! Coordinated commits metrics for Prometheus
//!
//! Tracks accepted commits by classification, rejections, and backfill trim
//! progress. The collector is owned by the router state and shared by `Arc`.

use crate::backfill::TrimOutcome;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// How an accepted commit request was classified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitKind {
    First,
    Normal,
    BackfillOnly,
    Reboard,
    Disown,
}

impl CommitKind {
    pub const ALL: [Self; 5] = [
        Self::First,
        Self::Normal,
        Self::BackfillOnly,
        Self::Reboard,
        Self::Disown,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Normal => "normal",
            Self::BackfillOnly => "backfill_only",
            Self::Reboard => "reboard",
            Self::Disown => "disown",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Normal => 1,
            Self::BackfillOnly => 2,
            Self::Reboard => 3,
            Self::Disown => 4,
        }
    }
}

/// Coordinated commits metrics collector
#[derive(Debug)]
pub struct CommitMetrics {
    accepted: [AtomicU64; 5],
    /// Version races lost
    conflicts: AtomicU64,
    /// Requests rejected for any other reason
    rejected: AtomicU64,
    rows_trimmed: AtomicU64,
    trim_batches: AtomicU64,
    /// Trims that gave up with rows still above the frontier
    trims_unconverged: AtomicU64,
    get_commits: AtomicU64,
    start_time: Instant,
}

impl Default for CommitMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            accepted: Default::default(),
            conflicts: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            rows_trimmed: AtomicU64::new(0),
            trim_batches: AtomicU64::new(0),
            trims_unconverged: AtomicU64::new(0),
            get_commits: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_accepted(&self, kind: CommitKind) {
        self.accepted[kind.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_trim(&self, outcome: &TrimOutcome) {
        self.rows_trimmed.fetch_add(outcome.deleted, Ordering::Relaxed);
        self.trim_batches
            .fetch_add(u64::from(outcome.batches), Ordering::Relaxed);
        if !outcome.converged {
            self.trims_unconverged.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_get_commits(&self) {
        self.get_commits.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn accepted(&self, kind: CommitKind) -> u64 {
        self.accepted[kind.index()].load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn conflicts(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn trims_unconverged(&self) -> u64 {
        self.trims_unconverged.load(Ordering::Relaxed)
    }

    /// Export metrics in Prometheus text format
    #[must_use]
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();
        // Writing into a String cannot fail
        let _ = self.write_prometheus(&mut output);
        output
    }

    fn write_prometheus(&self, output: &mut String) -> std::fmt::Result {
        writeln!(
            output,
            "# HELP lakelog_uptime_seconds Time since the commits service started"
        )?;
        writeln!(output, "# TYPE lakelog_uptime_seconds counter")?;
        writeln!(
            output,
            "lakelog_uptime_seconds {}",
            self.start_time.elapsed().as_secs()
        )?;

        writeln!(
            output,
            "# HELP lakelog_commits_accepted_total Accepted commit requests by classification"
        )?;
        writeln!(output, "# TYPE lakelog_commits_accepted_total counter")?;
        for kind in CommitKind::ALL {
            writeln!(
                output,
                "lakelog_commits_accepted_total{{kind=\"{}\"}} {}",
                kind.as_str(),
                self.accepted(kind)
            )?;
        }

        let counters = [
            (
                "lakelog_commit_conflicts_total",
                "Commits that lost a version race",
                &self.conflicts,
            ),
            (
                "lakelog_commits_rejected_total",
                "Commit requests rejected by validation",
                &self.rejected,
            ),
            (
                "lakelog_backfill_rows_trimmed_total",
                "Commit log rows deleted after backfill",
                &self.rows_trimmed,
            ),
            (
                "lakelog_backfill_trim_batches_total",
                "Trim transactions executed",
                &self.trim_batches,
            ),
            (
                "lakelog_backfill_trims_unconverged_total",
                "Trims that exhausted retries before reaching the frontier",
                &self.trims_unconverged,
            ),
            (
                "lakelog_get_commits_total",
                "getCommits requests served",
                &self.get_commits,
            ),
        ];
        for (name, help, counter) in counters {
            writeln!(output, "# HELP {name} {help}")?;
            writeln!(output, "# TYPE {name} counter")?;
            writeln!(output, "{name} {}", counter.load(Ordering::Relaxed))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_counters() {
        let metrics = CommitMetrics::new();
        metrics.record_accepted(CommitKind::Normal);
        metrics.record_accepted(CommitKind::Normal);
        metrics.record_conflict();
        metrics.record_trim(&TrimOutcome {
            expected: 10,
            deleted: 4,
            batches: 2,
            converged: false,
        });

        let text = metrics.export_prometheus();
        assert!(text.contains("lakelog_commits_accepted_total{kind=\"normal\"} 2"));
        assert!(text.contains("lakelog_commits_accepted_total{kind=\"first\"} 0"));
        assert!(text.contains("lakelog_commit_conflicts_total 1"));
        assert!(text.contains("lakelog_backfill_rows_trimmed_total 4"));
        assert!(text.contains("lakelog_backfill_trim_batches_total 2"));
        assert!(text.contains("lakelog_backfill_trims_unconverged_total 1"));
    }
}
