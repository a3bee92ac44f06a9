//! Retention cleanup: archive aged notifications, delete old archives and
//! fully-read notifications, and keep the archive under its cap.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use movehub_core::config::RetentionPolicy;
use movehub_core::result::AppResult;
use movehub_core::types::{LifecycleStatus, NotificationId, NotificationType, days_before};
use movehub_database::store::StorageEstimate;
use movehub_database::{NotificationFilter, NotificationStore, SortDirection};
use movehub_entity::notification::{ARCHIVE_REASON_AGE, NewNotification};
use movehub_service::{NotificationDispatcher, NotificationRules, RetentionSettings};

use crate::error::JobError;
use crate::job::{JobName, NotificationJob, RunCounts};
use crate::tracker::JobTracker;

/// What one cleanup run did.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CleanupReport {
    /// Cleanup was disabled; nothing was examined.
    pub skipped: bool,
    /// Notifications archived by age.
    pub archived: u64,
    /// Notifications deleted past the deletion age.
    pub deleted: u64,
    /// Fully-read notifications deleted past the retention age.
    pub auto_deleted: u64,
    /// Archived notifications deleted to respect the archive cap.
    pub archive_cap_deleted: u64,
    /// Whether a report notification went to the admins.
    pub report_sent: bool,
}

impl CleanupReport {
    /// Notifications touched by the run.
    pub fn total_work(&self) -> u64 {
        self.archived + self.deleted + self.auto_deleted + self.archive_cap_deleted
    }

    fn into_counts(self) -> RunCounts {
        RunCounts::from([
            ("skipped", u64::from(self.skipped)),
            ("archived", self.archived),
            ("deleted", self.deleted),
            ("auto_deleted", self.auto_deleted),
            ("archive_cap_deleted", self.archive_cap_deleted),
            ("reports_sent", u64::from(self.report_sent)),
        ])
    }
}

/// Counts a cleanup run would act on, computed without writing.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupPreview {
    /// Whether automatic cleanup is enabled.
    pub enabled: bool,
    /// Upper bound per step for a real run.
    pub batch_size: u32,
    /// Notifications old enough to archive.
    pub archive_eligible: u64,
    /// Notifications old enough to delete.
    pub delete_eligible: u64,
    /// Fully-read notifications past the retention age (zero when the
    /// option is off).
    pub auto_delete_eligible: u64,
    /// Archived notifications above the cap.
    pub archive_cap_excess: u64,
    /// Archived notifications now.
    pub archived_total: u64,
    /// Current storage footprint.
    pub storage: StorageEstimate,
}

/// Applies the retention policy to the notification store.
pub struct CleanupJob {
    store: Arc<dyn NotificationStore>,
    dispatcher: NotificationDispatcher,
    rules: NotificationRules,
    settings: RetentionSettings,
    tracker: JobTracker,
}

impl std::fmt::Debug for CleanupJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupJob").finish_non_exhaustive()
    }
}

impl CleanupJob {
    /// Creates a new cleanup job.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        dispatcher: NotificationDispatcher,
        rules: NotificationRules,
        settings: RetentionSettings,
    ) -> Self {
        Self {
            store,
            dispatcher,
            rules,
            settings,
            tracker: JobTracker::new(),
        }
    }

    /// Run every cleanup step against `policy` at `now`.
    ///
    /// Callers outside this crate go through [`NotificationJob::run`], which
    /// holds the running flag.
    pub async fn run_with(
        &self,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> Result<CleanupReport, JobError> {
        let mut report = CleanupReport::default();
        if !policy.enable_auto_cleanup {
            info!("Automatic cleanup disabled; skipping");
            report.skipped = true;
            return Ok(report);
        }
        let batch = u64::from(policy.notification_batch_size);

        // Archive by age.
        let archived_ids = self
            .candidate_ids(&archive_filter(policy, now)?, batch)
            .await?;
        if !archived_ids.is_empty() {
            report.archived = self
                .store
                .archive(&archived_ids, now, ARCHIVE_REASON_AGE)
                .await?;
        }

        // Delete past the deletion age. Rows archived a moment ago wait for
        // the next run.
        let fresh: HashSet<NotificationId> = archived_ids.iter().copied().collect();
        let doomed: Vec<NotificationId> = self
            .candidate_ids(&delete_filter(policy, now)?, batch + fresh.len() as u64)
            .await?
            .into_iter()
            .filter(|id| !fresh.contains(id))
            .take(batch as usize)
            .collect();
        report.deleted = self.delete(&doomed).await?;

        if policy.auto_delete_read_notifications {
            let read = self
                .candidate_ids(&auto_delete_filter(policy, now)?, batch)
                .await?;
            report.auto_deleted = self.delete(&read).await?;
        }

        // Archive cap, oldest first, regardless of age. Preserved types are
        // never trimmed.
        let archived_total = self.store.count(&archived_filter()).await?;
        let excess = archived_total.saturating_sub(policy.max_archive_size);
        if excess > 0 {
            let trimmable = archived_filter().excluding_types(policy.excluded_types());
            let trimmed = self
                .candidate_ids(&trimmable, excess.min(batch))
                .await?;
            report.archive_cap_deleted = self.delete(&trimmed).await?;
        }

        if report.total_work() > 0 {
            match self.send_report(&report).await {
                Ok(sent) => report.report_sent = sent,
                Err(e) => warn!(error = %e, "Failed to send cleanup report"),
            }
        } else {
            debug!("Cleanup found nothing to do");
        }

        info!(
            archived = report.archived,
            deleted = report.deleted,
            auto_deleted = report.auto_deleted,
            archive_cap_deleted = report.archive_cap_deleted,
            "Cleanup pass finished"
        );
        Ok(report)
    }

    /// Compute what a run would do now, without writing anything.
    pub async fn dry_run(&self) -> AppResult<CleanupPreview> {
        let policy = self.settings.current().await;
        let now = Utc::now();

        let auto_delete_eligible = if policy.auto_delete_read_notifications {
            self.store.count(&auto_delete_filter(&policy, now)?).await?
        } else {
            0
        };
        let archived_total = self.store.count(&archived_filter()).await?;

        Ok(CleanupPreview {
            enabled: policy.enable_auto_cleanup,
            batch_size: policy.notification_batch_size,
            archive_eligible: self.store.count(&archive_filter(&policy, now)?).await?,
            delete_eligible: self.store.count(&delete_filter(&policy, now)?).await?,
            auto_delete_eligible,
            archive_cap_excess: archived_total.saturating_sub(policy.max_archive_size),
            archived_total,
            storage: self.store.storage_estimate().await?,
        })
    }

    /// When the last run finished, if any.
    pub async fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.tracker.stats().await.last_run_at
    }

    async fn candidate_ids(
        &self,
        filter: &NotificationFilter,
        limit: u64,
    ) -> AppResult<Vec<NotificationId>> {
        Ok(self
            .store
            .find(filter, SortDirection::Asc, Some(limit), 0)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect())
    }

    async fn delete(&self, ids: &[NotificationId]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.store.delete(ids).await
    }

    async fn send_report(&self, report: &CleanupReport) -> AppResult<bool> {
        let storage = self.store.storage_estimate().await?;
        let admins = self.rules.admins().await?;
        let message = format!(
            "Archived {}, deleted {}, deleted {} read, trimmed {} from the archive",
            report.archived, report.deleted, report.auto_deleted, report.archive_cap_deleted
        );
        let draft = NewNotification::new(
            NotificationType::CleanupReport,
            "Notification cleanup completed",
            message,
            admins,
        )
        .with_metadata(json!({
            "archived": report.archived,
            "deleted": report.deleted,
            "auto_deleted": report.auto_deleted,
            "archive_cap_deleted": report.archive_cap_deleted,
            "storage": storage,
        }));
        Ok(self.dispatcher.dispatch(draft).await?.is_some())
    }
}

#[async_trait]
impl NotificationJob for CleanupJob {
    fn name(&self) -> JobName {
        JobName::Cleanup
    }

    fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    async fn execute(&self) -> Result<RunCounts, JobError> {
        let policy = self.settings.current().await;
        self.run_with(&policy, Utc::now())
            .await
            .map(CleanupReport::into_counts)
    }
}

fn archive_filter(policy: &RetentionPolicy, now: DateTime<Utc>) -> AppResult<NotificationFilter> {
    Ok(NotificationFilter::new()
        .with_statuses([LifecycleStatus::Active, LifecycleStatus::PendingReview])
        .admin_managed()
        .created_before(days_before(now, policy.min_age_for_archiving_days)?)
        .excluding_types(policy.excluded_types()))
}

fn delete_filter(policy: &RetentionPolicy, now: DateTime<Utc>) -> AppResult<NotificationFilter> {
    let statuses = if policy.archive_before_delete {
        vec![LifecycleStatus::Archived]
    } else {
        vec![
            LifecycleStatus::Archived,
            LifecycleStatus::Active,
            LifecycleStatus::PendingReview,
        ]
    };
    Ok(NotificationFilter::new()
        .with_statuses(statuses)
        .admin_managed()
        .created_before(days_before(now, policy.min_age_for_deletion_days)?)
        .excluding_types(policy.excluded_types()))
}

fn auto_delete_filter(
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> AppResult<NotificationFilter> {
    Ok(NotificationFilter {
        is_read_by_all: Some(true),
        ..NotificationFilter::new()
            .with_statuses([LifecycleStatus::Active])
            .admin_managed()
            .created_before(days_before(now, policy.max_retention_days)?)
            .excluding_types(policy.excluded_types())
    })
}

fn archived_filter() -> NotificationFilter {
    NotificationFilter::new().with_statuses([LifecycleStatus::Archived])
}
