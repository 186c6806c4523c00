//! Observer hooks and run metrics for the pipeline coordinator.
//!
//! A [`PipelineObserver`] receives one event per stage as a `make` run progresses;
//! [`PipelineMetrics`] keeps atomic counters callers can snapshot at any time.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Stage events emitted by [`crate::pipeline::DataProcessor`] during a run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RunStarted { run: u64 },
    RawFetched { rows: usize },
    TransformApplied { name: String, rows: usize },
    FilterApplied { rows_in: usize, rows_out: usize },
    MetaComputed { column: String, levels: usize },
    StatsComputed { groups: usize },
    RunFinished {
        run: u64,
        elapsed: Duration,
        metrics: PipelineMetricsSnapshot,
    },
}

/// Observer hook for pipeline events.
pub trait PipelineObserver: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// A simple stderr logger for pipeline events.
#[derive(Debug, Default)]
pub struct StdErrPipelineObserver;

impl PipelineObserver for StdErrPipelineObserver {
    fn on_event(&self, event: &PipelineEvent) {
        eprintln!("{event:?}");
    }
}

/// Real-time metrics for pipeline runs.
///
/// The coordinator updates these counters during `make`; callers can snapshot them at
/// any time.
pub struct PipelineMetrics {
    runs: AtomicU64,
    elapsed_ns: AtomicU64,

    rows_fetched: AtomicU64,
    rows_after_filter: AtomicU64,
    groups_emitted: AtomicU64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            runs: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            rows_fetched: AtomicU64::new(0),
            rows_after_filter: AtomicU64::new(0),
            groups_emitted: AtomicU64::new(0),
        }
    }

    pub(crate) fn begin_run(&self) -> u64 {
        let run = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.rows_fetched.store(0, Ordering::SeqCst);
        self.rows_after_filter.store(0, Ordering::SeqCst);
        self.groups_emitted.store(0, Ordering::SeqCst);
        run
    }

    pub(crate) fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(
            elapsed.as_nanos().min(u64::MAX as u128) as u64,
            Ordering::SeqCst,
        );
    }

    pub(crate) fn on_raw_rows(&self, rows: usize) {
        self.rows_fetched.store(rows as u64, Ordering::SeqCst);
    }

    pub(crate) fn on_filtered_rows(&self, rows: usize) {
        self.rows_after_filter.store(rows as u64, Ordering::SeqCst);
    }

    pub(crate) fn on_groups(&self, groups: usize) {
        self.groups_emitted.store(groups as u64, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        let elapsed = if elapsed_ns > 0 {
            Some(Duration::from_nanos(elapsed_ns))
        } else {
            None
        };
        PipelineMetricsSnapshot {
            runs: self.runs.load(Ordering::SeqCst),
            elapsed,
            rows_fetched: self.rows_fetched.load(Ordering::SeqCst),
            rows_after_filter: self.rows_after_filter.load(Ordering::SeqCst),
            groups_emitted: self.groups_emitted.load(Ordering::SeqCst),
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Immutable snapshot of [`PipelineMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineMetricsSnapshot {
    pub runs: u64,
    pub elapsed: Option<Duration>,
    pub rows_fetched: u64,
    pub rows_after_filter: u64,
    pub groups_emitted: u64,
}

impl fmt::Display for PipelineMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "runs={}, rows_fetched={}, rows_after_filter={}, groups_emitted={}, elapsed={:?}",
            self.runs,
            self.rows_fetched,
            self.rows_after_filter,
            self.groups_emitted,
            self.elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::PipelineMetrics;
    use std::time::Duration;

    #[test]
    fn begin_run_resets_counters_and_bumps_run_id() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.begin_run(), 1);
        metrics.on_raw_rows(10);
        metrics.on_filtered_rows(4);
        metrics.end_run(Duration::from_millis(3));

        let snap = metrics.snapshot();
        assert_eq!(snap.runs, 1);
        assert_eq!(snap.rows_fetched, 10);
        assert_eq!(snap.rows_after_filter, 4);
        assert!(snap.elapsed.is_some());

        assert_eq!(metrics.begin_run(), 2);
        let snap = metrics.snapshot();
        assert_eq!(snap.rows_fetched, 0);
        assert_eq!(snap.elapsed, None);
    }
}
