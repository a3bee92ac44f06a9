//! Scheduler owning the job timers, the lifecycle cron entry, and the
//! event capture adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use movehub_capture::{AdapterStats, EventCaptureAdapter};
use movehub_core::config::NotificationsConfig;
use movehub_core::error::AppError;
use movehub_core::result::AppResult;
use movehub_core::types::LifecycleStatus;
use movehub_database::{NotificationFilter, NotificationStore};
use movehub_service::{NotificationDispatcher, NotificationRules, RetentionSettings};

use crate::error::JobError;
use crate::health::{self, HealthInputs, HealthStatus, JobHealth, Staleness, SystemHealth};
use crate::job::{JobName, NotificationJob, RunCounts};
use crate::jobs::{CleanupJob, CleanupPreview, LifecycleJob, ReadReconciliationJob};
use crate::tracker::JobStats;

/// Status of one scheduled job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    /// Job name.
    pub name: JobName,
    /// Whether a timer or cron entry is armed.
    pub scheduled: bool,
    /// Whether a run is in progress.
    pub running: bool,
    /// Human-readable schedule.
    pub schedule: String,
    /// Run statistics.
    pub stats: JobStats,
}

/// Scheduler snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    /// Whether the scheduler is started.
    pub running: bool,
    /// When it was started.
    pub started_at: Option<DateTime<Utc>>,
    /// Per-job status.
    pub jobs: Vec<JobStatus>,
    /// Event capture counters, when an adapter is attached.
    pub capture: Option<AdapterStats>,
}

struct Timer {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct CronState {
    scheduler: JobScheduler,
    lifecycle_entry: Option<Uuid>,
}

#[derive(Default)]
struct SchedulerState {
    started_at: Option<DateTime<Utc>>,
    timers: HashMap<JobName, Timer>,
    cron: Option<CronState>,
}

/// Runs the notification jobs on their schedules.
pub struct NotificationScheduler {
    reconciliation: Arc<ReadReconciliationJob>,
    lifecycle: Arc<LifecycleJob>,
    cleanup: Arc<CleanupJob>,
    capture: Option<Arc<EventCaptureAdapter>>,
    store: Arc<dyn NotificationStore>,
    settings: RetentionSettings,
    config: NotificationsConfig,
    production: bool,
    state: Mutex<SchedulerState>,
}

impl std::fmt::Debug for NotificationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationScheduler")
            .field("production", &self.production)
            .finish_non_exhaustive()
    }
}

impl NotificationScheduler {
    /// Build the jobs; nothing is scheduled until [`start`](Self::start).
    pub fn new(
        store: Arc<dyn NotificationStore>,
        dispatcher: NotificationDispatcher,
        rules: NotificationRules,
        settings: RetentionSettings,
        config: NotificationsConfig,
        production: bool,
    ) -> Self {
        let cleanup = Arc::new(CleanupJob::new(
            Arc::clone(&store),
            dispatcher.clone(),
            rules.clone(),
            settings.clone(),
        ));
        let reconciliation = Arc::new(ReadReconciliationJob::new(
            Arc::clone(&store),
            settings.clone(),
            Arc::clone(&cleanup),
            config.reconciliation.clone(),
        ));
        let lifecycle = Arc::new(LifecycleJob::new(
            Arc::clone(&store),
            dispatcher,
            rules,
            settings.clone(),
            config.lifecycle.clone(),
        ));
        Self {
            reconciliation,
            lifecycle,
            cleanup,
            capture: None,
            store,
            settings,
            config,
            production,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    /// Attach the event capture adapter; it starts and stops with the
    /// scheduler.
    pub fn with_capture(mut self, adapter: Arc<EventCaptureAdapter>) -> Self {
        self.capture = Some(adapter);
        self
    }

    /// The attached adapter, if any.
    pub fn capture(&self) -> Option<&Arc<EventCaptureAdapter>> {
        self.capture.as_ref()
    }

    /// Arm every timer, register the lifecycle cron entry, and start the
    /// adapter. Idempotent.
    pub async fn start(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.started_at.is_some() {
            debug!("Scheduler already running");
            return Ok(());
        }

        // Registration can fail on a bad cron expression; do it before
        // anything is spawned.
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;
        let entry = self.add_lifecycle_entry(&scheduler).await?;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;
        state.cron = Some(CronState {
            scheduler,
            lifecycle_entry: Some(entry),
        });

        if let Some(adapter) = &self.capture {
            // Jobs do not depend on the adapter.
            if let Err(e) = adapter.start().await {
                error!(error = %e, "Failed to start event capture adapter");
            }
        }

        for name in [JobName::ReadReconciliation, JobName::Cleanup] {
            let timer = self.spawn_timer(name);
            state.timers.insert(name, timer);
        }

        if self.config.lifecycle.run_on_start {
            if self.production {
                warn!("Ignoring lifecycle run_on_start in production");
            } else {
                let job = Arc::clone(&self.lifecycle);
                tokio::spawn(async move {
                    let _ = job.run().await;
                });
            }
        }

        state.started_at = Some(Utc::now());
        info!(
            reconciliation_interval_secs = self.config.reconciliation.interval_secs,
            cleanup_interval_secs = self.config.cleanup.interval_secs,
            lifecycle_cron = %self.config.lifecycle.cron,
            "Notification scheduler started"
        );
        Ok(())
    }

    /// Cancel pending ticks, shut down the cron scheduler, and stop the
    /// adapter. In-flight runs finish first.
    pub async fn stop(&self) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.started_at.take().is_none() {
            return Ok(());
        }

        join_all(
            state
                .timers
                .drain()
                .map(|(name, timer)| stop_timer(name, timer)),
        )
        .await;
        let cron = state.cron.take();
        let result = stop_capture_then(self.capture.as_deref(), async move {
            match cron {
                Some(mut cron) => cron.scheduler.shutdown().await.map_err(|e| {
                    AppError::internal(format!("Failed to shutdown scheduler: {e}"))
                }),
                None => Ok(()),
            }
        })
        .await;

        match &result {
            Ok(()) => info!("Notification scheduler stopped"),
            Err(e) => error!(error = %e, "Notification scheduler stopped with errors"),
        }
        result
    }

    /// Run a job now, outside its schedule.
    pub async fn run_job(&self, name: JobName) -> Result<RunCounts, JobError> {
        info!(job = %name, "Manual job run requested");
        self.job(name).run().await
    }

    /// Re-arm a job's timer or cron entry.
    pub async fn restart_job(&self, name: JobName) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.started_at.is_none() {
            return Err(AppError::conflict("Scheduler is not running"));
        }

        match name {
            JobName::Lifecycle => {
                let Some(cron) = state.cron.as_mut() else {
                    return Err(AppError::internal("Cron scheduler missing"));
                };
                if let Some(entry) = cron.lifecycle_entry.take() {
                    cron.scheduler.remove(&entry).await.map_err(|e| {
                        AppError::internal(format!("Failed to remove lifecycle schedule: {e}"))
                    })?;
                }
                let entry = self.add_lifecycle_entry(&cron.scheduler).await?;
                cron.lifecycle_entry = Some(entry);
            }
            JobName::ReadReconciliation | JobName::Cleanup => {
                if let Some(timer) = state.timers.remove(&name) {
                    stop_timer(name, timer).await;
                }
                let timer = self.spawn_timer(name);
                state.timers.insert(name, timer);
            }
        }

        info!(job = %name, "Job schedule restarted");
        Ok(())
    }

    /// Scheduler and per-job status.
    pub async fn status(&self) -> SchedulerStatus {
        let state = self.state.lock().await;
        let mut jobs = Vec::with_capacity(JobName::ALL.len());
        for name in JobName::ALL {
            let job = self.job(name);
            let scheduled = match name {
                JobName::Lifecycle => state
                    .cron
                    .as_ref()
                    .is_some_and(|c| c.lifecycle_entry.is_some()),
                _ => state
                    .timers
                    .get(&name)
                    .is_some_and(|t| !t.task.is_finished()),
            };
            jobs.push(JobStatus {
                name,
                scheduled,
                running: job.tracker().is_running(),
                schedule: self.schedule_label(name),
                stats: job.tracker().stats().await,
            });
        }
        let started_at = state.started_at;
        drop(state);

        SchedulerStatus {
            running: started_at.is_some(),
            started_at,
            jobs,
            capture: self.capture_stats().await,
        }
    }

    /// Per-job health.
    pub async fn job_health(&self) -> Vec<JobHealth> {
        let started_at = self.state.lock().await.started_at;
        let now = Utc::now();
        let mut out = Vec::with_capacity(JobName::ALL.len());
        for name in JobName::ALL {
            let job = self.job(name);
            out.push(health::evaluate_job(
                name,
                &job.tracker().stats().await,
                job.tracker().is_running(),
                self.staleness(name),
                started_at,
                now,
            ));
        }
        out
    }

    /// Worst status across the jobs.
    pub async fn health_check(&self) -> HealthStatus {
        self.job_health()
            .await
            .iter()
            .map(|j| j.status)
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }

    /// Job health combined with storage figures.
    pub async fn system_health(&self) -> AppResult<SystemHealth> {
        let now = Utc::now();
        let jobs = self.job_health().await;
        let scheduler_running = self.state.lock().await.started_at.is_some();
        let policy = self.settings.current().await;

        let archived = self
            .store
            .count(&NotificationFilter::new().with_statuses([LifecycleStatus::Archived]))
            .await?;
        let pending_review = self
            .store
            .count(&NotificationFilter {
                needs_review_at: Some(now),
                ..Default::default()
            })
            .await?;

        Ok(SystemHealth::assess(
            HealthInputs {
                scheduler_running,
                jobs,
                capture: self.capture_stats().await,
                storage: self.store.storage_estimate().await?,
                archived,
                max_archive_size: policy.max_archive_size,
                pending_review,
            },
            now,
        ))
    }

    /// What a cleanup run would do now.
    pub async fn cleanup_preview(&self) -> AppResult<CleanupPreview> {
        self.cleanup.dry_run().await
    }

    fn job(&self, name: JobName) -> Arc<dyn NotificationJob> {
        match name {
            JobName::ReadReconciliation => {
                Arc::clone(&self.reconciliation) as Arc<dyn NotificationJob>
            }
            JobName::Lifecycle => Arc::clone(&self.lifecycle) as Arc<dyn NotificationJob>,
            JobName::Cleanup => Arc::clone(&self.cleanup) as Arc<dyn NotificationJob>,
        }
    }

    /// Startup delay and period for the interval-driven jobs.
    fn timing(&self, name: JobName) -> (StdDuration, StdDuration) {
        let (delay, period) = match name {
            JobName::ReadReconciliation => (
                self.config.reconciliation.startup_delay_secs,
                self.config.reconciliation.interval_secs,
            ),
            JobName::Cleanup => (
                self.config.cleanup.startup_delay_secs,
                self.config.cleanup.interval_secs,
            ),
            JobName::Lifecycle => (0, 86_400),
        };
        (
            StdDuration::from_secs(delay),
            StdDuration::from_secs(period.max(1)),
        )
    }

    fn staleness(&self, name: JobName) -> Staleness {
        let (_, period) = self.timing(name);
        let period = Duration::from_std(period).unwrap_or_else(|_| Duration::days(1));
        Staleness::for_period(period, name == JobName::Lifecycle)
    }

    fn schedule_label(&self, name: JobName) -> String {
        match name {
            JobName::Lifecycle => format!("cron '{}' (local time)", self.lifecycle.cron()),
            _ => {
                let (delay, period) = self.timing(name);
                format!(
                    "every {}s after {}s",
                    period.as_secs(),
                    delay.as_secs()
                )
            }
        }
    }

    fn spawn_timer(&self, name: JobName) -> Timer {
        let (delay, period) = self.timing(name);
        let job = self.job(name);
        let (cancel, mut cancelled) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    changed = cancelled.changed() => {
                        if changed.is_err() || *cancelled.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        // Outcome is logged and recorded by `run`.
                        let _ = job.run().await;
                    }
                }
            }
            debug!(job = %name, "Job timer stopped");
        });

        info!(
            job = %name,
            startup_delay_secs = delay.as_secs(),
            interval_secs = period.as_secs(),
            "Job timer armed"
        );
        Timer { cancel, task }
    }

    async fn add_lifecycle_entry(&self, scheduler: &JobScheduler) -> AppResult<Uuid> {
        let job = Arc::clone(&self.lifecycle);
        let entry = CronJob::new_async_tz(self.lifecycle.cron(), chrono::Local, move |_uuid, _lock| {
            let job = Arc::clone(&job);
            Box::pin(async move {
                let _ = job.run().await;
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid lifecycle cron '{}': {e}",
                self.lifecycle.cron()
            ))
        })?;

        let id = scheduler
            .add(entry)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add lifecycle schedule: {e}")))?;
        info!(cron = %self.lifecycle.cron(), "Registered: lifecycle");
        Ok(id)
    }

    async fn capture_stats(&self) -> Option<AdapterStats> {
        match &self.capture {
            Some(adapter) => Some(adapter.stats().await),
            None => None,
        }
    }
}

/// Stop the capture adapter, then await `shutdown`. The adapter stops
/// whatever `shutdown` returns.
async fn stop_capture_then<F>(capture: Option<&EventCaptureAdapter>, shutdown: F) -> AppResult<()>
where
    F: Future<Output = AppResult<()>>,
{
    if let Some(adapter) = capture {
        adapter.stop().await;
    }
    shutdown.await
}

async fn stop_timer(name: JobName, timer: Timer) {
    let _ = timer.cancel.send(true);
    if let Err(e) = timer.task.await {
        error!(job = %name, error = %e, "Job timer ended abnormally");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{Env, env, seed};
    use movehub_core::config::{
        CleanupScheduleConfig, LifecycleConfig, ReconciliationConfig, RetentionPolicy,
    };
    use movehub_capture::{CaptureBackend, ChangeHandler};
    use movehub_core::config::CaptureConfig;
    use movehub_core::types::{NotificationType, UserId};

    fn config() -> NotificationsConfig {
        NotificationsConfig {
            reconciliation: ReconciliationConfig {
                startup_delay_secs: 0,
                interval_secs: 3600,
                ..Default::default()
            },
            cleanup: CleanupScheduleConfig {
                startup_delay_secs: 3600,
                interval_secs: 3600,
            },
            lifecycle: LifecycleConfig::default(),
            ..Default::default()
        }
    }

    fn scheduler(e: &Env, config: NotificationsConfig, production: bool) -> NotificationScheduler {
        NotificationScheduler::new(
            e.store.clone(),
            e.dispatcher.clone(),
            e.rules.clone(),
            e.settings.clone(),
            config,
            production,
        )
    }

    async fn runs(s: &NotificationScheduler, name: JobName) -> u64 {
        s.job(name).tracker().stats().await.total_runs
    }

    async fn wait_for_run(s: &NotificationScheduler, name: JobName) -> u64 {
        for _ in 0..200 {
            let n = runs(s, name).await;
            if n > 0 {
                return n;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
        runs(s, name).await
    }

    #[tokio::test]
    async fn test_capture_stops_even_when_cron_shutdown_fails() {
        let e = env(RetentionPolicy::default()).await;
        let adapter = EventCaptureAdapter::new(
            ChangeHandler::new(e.directory.clone(), e.rules.clone(), e.dispatcher.clone()),
            e.directory.clone(),
            CaptureBackend::Memory(e.directory.as_ref().clone()),
            CaptureConfig::default(),
        );
        adapter.start().await.unwrap();
        assert!(adapter.stats().await.running);

        let result = stop_capture_then(Some(&adapter), async {
            Err(AppError::internal("shutdown failed"))
        })
        .await;

        assert!(result.is_err());
        assert!(!adapter.stats().await.running);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_is_idempotent_and_stop_clears_schedule() {
        let e = env(RetentionPolicy::default()).await;
        let s = scheduler(&e, config(), false);

        s.start().await.unwrap();
        s.start().await.unwrap();
        let status = s.status().await;
        assert!(status.running);
        assert!(status.jobs.iter().all(|j| j.scheduled));
        assert_eq!(wait_for_run(&s, JobName::ReadReconciliation).await, 1);
        assert_eq!(runs(&s, JobName::Cleanup).await, 0);

        s.stop().await.unwrap();
        let status = s.status().await;
        assert!(!status.running);
        assert!(status.jobs.iter().all(|j| !j.scheduled));
        s.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_job_on_demand() {
        let e = env(RetentionPolicy::default()).await;
        seed(&e.store, NotificationType::UserCreated, 31, vec![UserId::new()]).await;
        let s = scheduler(&e, config(), false);

        let counts = s.run_job(JobName::Lifecycle).await.unwrap();
        assert_eq!(counts["moved_to_review"], 1);
        assert_eq!(runs(&s, JobName::Lifecycle).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_restart_requires_running_scheduler() {
        let e = env(RetentionPolicy::default()).await;
        let s = scheduler(&e, config(), false);
        assert!(s.restart_job(JobName::Cleanup).await.is_err());

        s.start().await.unwrap();
        s.restart_job(JobName::Cleanup).await.unwrap();
        s.restart_job(JobName::Lifecycle).await.unwrap();
        assert!(s.status().await.jobs.iter().all(|j| j.scheduled));
        s.stop().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_on_start_is_ignored_in_production() {
        let e = env(RetentionPolicy::default()).await;
        seed(&e.store, NotificationType::UserCreated, 31, vec![UserId::new()]).await;
        let mut cfg = config();
        cfg.lifecycle.run_on_start = true;

        let prod = scheduler(&e, cfg.clone(), true);
        prod.start().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(runs(&prod, JobName::Lifecycle).await, 0);
        prod.stop().await.unwrap();

        let dev = scheduler(&e, cfg, false);
        dev.start().await.unwrap();
        assert_eq!(wait_for_run(&dev, JobName::Lifecycle).await, 1);
        dev.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_system_health_reports_backlog() {
        let e = env(RetentionPolicy::default()).await;
        for _ in 0..101 {
            let mut n = seed(&e.store, NotificationType::UserCreated, 31, vec![UserId::new()]).await;
            n.lifecycle_status = LifecycleStatus::PendingReview;
            n.reminder_sent_at = Some(Utc::now());
            e.store.put(n).await;
        }
        let s = scheduler(&e, config(), false);

        let health = s.system_health().await.unwrap();
        assert_eq!(health.pending_review, 101);
        assert!(!health.scheduler_running);
        assert_eq!(health.status, HealthStatus::Warning);
        assert_eq!(s.health_check().await, HealthStatus::Healthy);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_invalid_cron_fails_start() {
        let e = env(RetentionPolicy::default()).await;
        let mut cfg = config();
        cfg.lifecycle.cron = "not a cron".to_string();
        let s = scheduler(&e, cfg, false);
        assert!(s.start().await.is_err());
    }
}
