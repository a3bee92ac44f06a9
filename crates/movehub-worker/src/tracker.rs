//! Per-job run tracking.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::JobError;
use crate::job::RunCounts;

/// Statistics for one job since process start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobStats {
    /// Completed runs, failed ones included.
    pub total_runs: u64,
    /// Runs that ended in a job-level error.
    pub errors: u64,
    /// When the last run finished.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Duration of the last run.
    pub last_duration_ms: Option<u64>,
    /// Message of the last job-level error.
    pub last_error: Option<String>,
    /// Counters summed over every successful run.
    pub totals: BTreeMap<String, u64>,
    /// Counters of the last successful run.
    pub last_run: BTreeMap<String, u64>,
}

impl JobStats {
    /// Fraction of runs that failed; zero before the first run.
    pub fn error_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.errors as f64 / self.total_runs as f64
        }
    }
}

/// Running flag plus statistics for one job.
#[derive(Debug, Default)]
pub struct JobTracker {
    running: AtomicBool,
    stats: Mutex<JobStats>,
}

impl JobTracker {
    /// Creates an idle tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the running flag. `None` when a run is already in progress.
    pub fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard {
                flag: &self.running,
            })
    }

    /// Whether a run is in progress.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Record the outcome of a finished run.
    pub async fn record(&self, result: &Result<RunCounts, JobError>, elapsed: Duration) {
        let mut stats = self.stats.lock().await;
        stats.total_runs += 1;
        stats.last_run_at = Some(Utc::now());
        stats.last_duration_ms = Some(elapsed.as_millis() as u64);
        match result {
            Ok(counts) => {
                stats.last_run.clear();
                for (key, value) in counts {
                    *stats.totals.entry((*key).to_string()).or_insert(0) += value;
                    stats.last_run.insert((*key).to_string(), *value);
                }
            }
            Err(e) => {
                stats.errors += 1;
                stats.last_error = Some(e.to_string());
            }
        }
    }

    /// Copy of the current statistics.
    pub async fn stats(&self) -> JobStats {
        self.stats.lock().await.clone()
    }
}

/// Clears the running flag when dropped, including on unwind.
#[derive(Debug)]
pub struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
