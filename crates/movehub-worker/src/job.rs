//! Job trait and tracked execution.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use movehub_core::error::AppError;

use crate::error::JobError;
use crate::tracker::JobTracker;

/// Named counters produced by one run.
pub type RunCounts = BTreeMap<&'static str, u64>;

/// The scheduled notification jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobName {
    /// Repairs cached `is_read_by_all` flags.
    ReadReconciliation,
    /// Advances notifications through review and extension.
    Lifecycle,
    /// Archives and deletes old notifications.
    Cleanup,
}

impl JobName {
    /// All jobs, in status display order.
    pub const ALL: [JobName; 3] = [Self::ReadReconciliation, Self::Lifecycle, Self::Cleanup];

    /// Return the job name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReadReconciliation => "read_reconciliation",
            Self::Lifecycle => "lifecycle",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|job| job.as_str() == s)
            .ok_or_else(|| AppError::not_found(format!("Unknown job: '{s}'")))
    }
}

/// A background job with its own run tracking.
#[async_trait]
pub trait NotificationJob: Send + Sync + 'static {
    /// Job name.
    fn name(&self) -> JobName;

    /// Running flag and statistics.
    fn tracker(&self) -> &JobTracker;

    /// One pass of the job's work. Callers go through [`run`](Self::run).
    async fn execute(&self) -> Result<RunCounts, JobError>;

    /// Run once unless a run is already in progress, recording the outcome.
    async fn run(&self) -> Result<RunCounts, JobError> {
        let name = self.name();
        let Some(_guard) = self.tracker().try_begin() else {
            warn!(job = %name, "Run skipped: already running");
            return Err(JobError::AlreadyRunning(name.as_str()));
        };

        let started = Instant::now();
        let result = self.execute().await;
        let elapsed = started.elapsed();
        self.tracker().record(&result, elapsed).await;

        match &result {
            Ok(counts) => info!(
                job = %name,
                duration_ms = elapsed.as_millis() as u64,
                counts = ?counts,
                "Job run complete"
            ),
            Err(e) => error!(
                job = %name,
                duration_ms = elapsed.as_millis() as u64,
                error = %e,
                "Job run failed"
            ),
        }
        result
    }
}
