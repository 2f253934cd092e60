//! Run-wide download metrics
//!
//! [`Metrics`] is shared as `Arc<Metrics>` between the reader and every download
//! task. All counters are lock-free atomics so concurrent callers never need an
//! external lock; the finish timestamp is written once by the orchestrator.

use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters for a single pipeline run
///
/// `succeeded + failed <= total` holds at every instant. Equality is reached once
/// the download stage has joined all of its tasks, unless shutdown dropped URLs
/// between dequeue and dispatch.
#[derive(Debug)]
pub struct Metrics {
    /// URLs accepted from the input file
    total: AtomicU64,
    /// Downloads that returned a success status and a readable body
    succeeded: AtomicU64,
    /// Downloads that failed for any reason (including shutdown mid-request)
    failed: AtomicU64,
    /// Sum of successful download durations (nanoseconds)
    success_nanos: AtomicU64,
    /// When the run started
    started_at: Instant,
    /// When the run finished (set once by the orchestrator)
    finished_at: Mutex<Option<Instant>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a zeroed metrics set whose wall clock starts now
    #[must_use]
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            success_nanos: AtomicU64::new(0),
            started_at: Instant::now(),
            finished_at: Mutex::new(None),
        }
    }

    /// Count one URL read from the input
    pub fn record_url(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one successful download and add its latency to the running total
    pub fn record_success(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.success_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed download
    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Total URLs seen so far
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Successful downloads so far
    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    /// Failed downloads so far
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Freeze the wall clock. Later calls keep the first timestamp.
    pub fn mark_finished(&self) {
        let mut finished = self
            .finished_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        finished.get_or_insert_with(Instant::now);
    }

    /// Point-in-time snapshot of the counters
    ///
    /// Only meaningful once every producer has stopped; the orchestrator calls it
    /// after all stages have returned.
    pub fn summary(&self) -> MetricsSummary {
        let succeeded = self.succeeded();
        let total_success = Duration::from_nanos(self.success_nanos.load(Ordering::Relaxed));
        let avg_latency = if succeeded > 0 {
            total_success / u32::try_from(succeeded).unwrap_or(u32::MAX)
        } else {
            Duration::ZERO
        };

        let finished_at = *self
            .finished_at
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let wall_time = finished_at
            .unwrap_or_else(Instant::now)
            .saturating_duration_since(self.started_at);

        MetricsSummary {
            total: self.total(),
            succeeded,
            failed: self.failed(),
            avg_latency,
            wall_time,
        }
    }

    /// Emit the summary as a structured log event and return it
    pub fn log_summary(&self) -> MetricsSummary {
        let summary = self.summary();
        tracing::info!(
            total_urls = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            avg_download = ?summary.avg_latency,
            wall_time = ?summary.wall_time,
            "Summary"
        );
        summary
    }
}

/// Immutable snapshot produced by [`Metrics::summary`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSummary {
    /// URLs accepted from the input
    pub total: u64,
    /// Successful downloads
    pub succeeded: u64,
    /// Failed downloads
    pub failed: u64,
    /// Mean latency of successful downloads (zero when none succeeded)
    pub avg_latency: Duration,
    /// Time from run start to run finish
    pub wall_time: Duration,
}

impl MetricsSummary {
    /// URLs that were read but never reached a download outcome
    pub fn unaccounted(&self) -> u64 {
        self.total.saturating_sub(self.succeeded + self.failed)
    }
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Summary: Total URLs={}, Success={}, Failures={}, Avg Download Duration={:?}, Total Time={:?}",
            self.total, self.succeeded, self.failed, self.avg_latency, self.wall_time
        )
    }
}
