//! Health evaluation over job statistics and storage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use movehub_capture::AdapterStats;
use movehub_database::store::StorageEstimate;

use crate::job::JobName;
use crate::tracker::JobStats;

/// Error rate above which a job is unhealthy.
pub const MAX_ERROR_RATE: f64 = 0.10;

/// Minimum silence, in hours, before a job counts as stale.
pub const MIN_STALENESS_HOURS: i64 = 2;

/// Archive fill ratio that raises an alert.
pub const ARCHIVE_ALERT_RATIO: f64 = 0.8;

/// Pending-review backlog that raises an alert.
pub const REVIEW_BACKLOG_ALERT: u64 = 100;

/// Overall or per-job health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Nothing to report.
    Healthy,
    /// Degraded but working.
    Warning,
    /// Needs attention.
    Unhealthy,
}

/// Health of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobHealth {
    /// Job name.
    pub name: JobName,
    /// Evaluated status.
    pub status: HealthStatus,
    /// Whether a run is in progress.
    pub running: bool,
    /// Fraction of failed runs.
    pub error_rate: f64,
    /// When the last run finished.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Why the status is not healthy.
    pub issues: Vec<String>,
}

/// How stale a job may get before it is flagged.
#[derive(Debug, Clone, Copy)]
pub struct Staleness {
    /// Allowed silence.
    pub threshold: Duration,
    /// Whether a job that never ran is exempt.
    pub exempt_until_first_run: bool,
}

impl Staleness {
    /// Threshold for a job expected every `period`: twice the period, at
    /// least [`MIN_STALENESS_HOURS`].
    pub fn for_period(period: Duration, exempt_until_first_run: bool) -> Self {
        Self {
            threshold: std::cmp::max(Duration::hours(MIN_STALENESS_HOURS), period * 2),
            exempt_until_first_run,
        }
    }
}

/// Evaluate one job.
///
/// Staleness only applies while the scheduler runs; `started_at` is when
/// it started.
pub fn evaluate_job(
    name: JobName,
    stats: &JobStats,
    running: bool,
    staleness: Staleness,
    started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> JobHealth {
    let mut status = HealthStatus::Healthy;
    let mut issues = Vec::new();

    let error_rate = stats.error_rate();
    if error_rate > MAX_ERROR_RATE {
        status = HealthStatus::Unhealthy;
        issues.push(format!(
            "error rate {:.0}% over {} runs",
            error_rate * 100.0,
            stats.total_runs
        ));
    }

    if let Some(started_at) = started_at {
        let silent_since = match stats.last_run_at {
            Some(last) => Some(last),
            None if staleness.exempt_until_first_run => None,
            None => Some(started_at),
        };
        if let Some(since) = silent_since {
            if now - since > staleness.threshold && !running {
                status = status.max(HealthStatus::Warning);
                issues.push(match stats.last_run_at {
                    Some(last) => format!("no run since {}", last.to_rfc3339()),
                    None => "has not run since the scheduler started".to_string(),
                });
            }
        }
    }

    JobHealth {
        name,
        status,
        running,
        error_rate,
        last_run_at: stats.last_run_at,
        issues,
    }
}

/// Scheduler-level health report.
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    /// Worst status across jobs and alerts.
    pub status: HealthStatus,
    /// Whether the scheduler is running.
    pub scheduler_running: bool,
    /// When the report was produced.
    pub checked_at: DateTime<Utc>,
    /// Per-job health.
    pub jobs: Vec<JobHealth>,
    /// Event capture counters, when an adapter is attached.
    pub capture: Option<AdapterStats>,
    /// Notification collection size.
    pub storage: StorageEstimate,
    /// Archived notifications.
    pub archived: u64,
    /// Configured archive cap.
    pub max_archive_size: u64,
    /// Notifications awaiting admin review.
    pub pending_review: u64,
    /// Conditions that need attention.
    pub alerts: Vec<String>,
    /// Suggested actions.
    pub recommendations: Vec<String>,
}

/// Inputs gathered by the scheduler for [`SystemHealth::assess`].
#[derive(Debug, Clone)]
pub struct HealthInputs {
    /// Whether the scheduler is running.
    pub scheduler_running: bool,
    /// Per-job health.
    pub jobs: Vec<JobHealth>,
    /// Event capture counters.
    pub capture: Option<AdapterStats>,
    /// Notification collection size.
    pub storage: StorageEstimate,
    /// Archived notifications.
    pub archived: u64,
    /// Configured archive cap.
    pub max_archive_size: u64,
    /// Notifications awaiting admin review.
    pub pending_review: u64,
}

impl SystemHealth {
    /// Combine job health with storage figures into alerts.
    pub fn assess(inputs: HealthInputs, now: DateTime<Utc>) -> Self {
        let mut alerts = Vec::new();
        let mut recommendations = Vec::new();
        let mut status = inputs
            .jobs
            .iter()
            .map(|j| j.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);

        for job in inputs.jobs.iter().filter(|j| j.status == HealthStatus::Unhealthy) {
            alerts.push(format!("Job '{}' is unhealthy: {}", job.name, job.issues.join("; ")));
            recommendations.push(format!("Inspect the '{}' job logs and restart it", job.name));
        }

        if !inputs.scheduler_running {
            status = status.max(HealthStatus::Warning);
            alerts.push("Scheduler is not running".to_string());
            recommendations.push("Start the scheduler".to_string());
        }

        if inputs.max_archive_size > 0 {
            let ratio = inputs.archived as f64 / inputs.max_archive_size as f64;
            if ratio > ARCHIVE_ALERT_RATIO {
                status = status.max(HealthStatus::Warning);
                alerts.push(format!(
                    "Archive at {:.0}% of capacity ({}/{})",
                    ratio * 100.0,
                    inputs.archived,
                    inputs.max_archive_size
                ));
                recommendations.push(
                    "Lower min_age_for_deletion_days or raise max_archive_size".to_string(),
                );
            }
        }

        if inputs.pending_review > REVIEW_BACKLOG_ALERT {
            status = status.max(HealthStatus::Warning);
            alerts.push(format!(
                "{} notifications awaiting review",
                inputs.pending_review
            ));
            recommendations
                .push("Review pending notifications or bulk delete stale ones".to_string());
        }

        if let Some(mode) = inputs.capture.as_ref().and_then(|c| c.mode) {
            if mode.is_degraded() {
                status = status.max(HealthStatus::Warning);
                alerts.push("Event capture is polling; live change feed unavailable".to_string());
                recommendations.push(
                    "Install the change trigger migration to restore the live feed".to_string(),
                );
            }
        }

        Self {
            status,
            scheduler_running: inputs.scheduler_running,
            checked_at: now,
            jobs: inputs.jobs,
            capture: inputs.capture,
            storage: inputs.storage,
            archived: inputs.archived,
            max_archive_size: inputs.max_archive_size,
            pending_review: inputs.pending_review,
            alerts,
            recommendations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use movehub_capture::CaptureMode;

    fn stats(runs: u64, errors: u64, last_run_at: Option<DateTime<Utc>>) -> JobStats {
        JobStats {
            total_runs: runs,
            errors,
            last_run_at,
            ..JobStats::default()
        }
    }

    fn hourly() -> Staleness {
        Staleness::for_period(Duration::hours(1), false)
    }

    #[test]
    fn test_error_rate_over_ten_percent_is_unhealthy() {
        let now = Utc::now();
        let health = evaluate_job(
            JobName::Cleanup,
            &stats(10, 2, Some(now)),
            false,
            hourly(),
            Some(now),
            now,
        );
        assert_eq!(health.status, HealthStatus::Unhealthy);

        let fine = evaluate_job(
            JobName::Cleanup,
            &stats(10, 1, Some(now)),
            false,
            hourly(),
            Some(now),
            now,
        );
        assert_eq!(fine.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_stale_job_warns_only_while_scheduler_runs() {
        let now = Utc::now();
        let last = Some(now - Duration::hours(3));
        let warned = evaluate_job(
            JobName::ReadReconciliation,
            &stats(1, 0, last),
            false,
            hourly(),
            Some(now - Duration::hours(5)),
            now,
        );
        assert_eq!(warned.status, HealthStatus::Warning);

        let stopped = evaluate_job(
            JobName::ReadReconciliation,
            &stats(1, 0, last),
            false,
            hourly(),
            None,
            now,
        );
        assert_eq!(stopped.status, HealthStatus::Healthy);
    }

    #[test]
    fn test_daily_job_exempt_until_first_run() {
        let now = Utc::now();
        let daily = Staleness::for_period(Duration::days(1), true);
        let health = evaluate_job(
            JobName::Lifecycle,
            &JobStats::default(),
            false,
            daily,
            Some(now - Duration::hours(10)),
            now,
        );
        assert_eq!(health.status, HealthStatus::Healthy);

        let late = evaluate_job(
            JobName::Lifecycle,
            &stats(1, 0, Some(now - Duration::days(3))),
            false,
            daily,
            Some(now - Duration::days(4)),
            now,
        );
        assert_eq!(late.status, HealthStatus::Warning);
    }

    #[test]
    fn test_system_alerts() {
        let inputs = HealthInputs {
            scheduler_running: true,
            jobs: Vec::new(),
            capture: Some(AdapterStats {
                mode: Some(CaptureMode::Polling),
                running: true,
                events_processed: 0,
                events_failed: 0,
                notifications_created: 0,
                last_event_at: None,
            }),
            storage: StorageEstimate::default(),
            archived: 850,
            max_archive_size: 1000,
            pending_review: 101,
        };
        let health = SystemHealth::assess(inputs, Utc::now());
        assert_eq!(health.status, HealthStatus::Warning);
        assert_eq!(health.alerts.len(), 3);
        assert_eq!(health.recommendations.len(), 3);
    }

    #[test]
    fn test_quiet_system_is_healthy() {
        let inputs = HealthInputs {
            scheduler_running: true,
            jobs: Vec::new(),
            capture: None,
            storage: StorageEstimate::default(),
            archived: 800,
            max_archive_size: 1000,
            pending_review: 100,
        };
        let health = SystemHealth::assess(inputs, Utc::now());
        assert_eq!(health.status, HealthStatus::Healthy);
        assert!(health.alerts.is_empty());
    }
}
