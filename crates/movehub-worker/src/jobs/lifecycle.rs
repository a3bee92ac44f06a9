//! Lifecycle advancement: move aged notifications to review, remind the
//! admins, and extend important ones awaiting review.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use movehub_core::config::LifecycleConfig;
use movehub_core::types::{LifecycleStatus, NotificationType, days_before};
use movehub_database::{NotificationFilter, NotificationStore, SortDirection};
use movehub_entity::notification::{NewNotification, Notification};
use movehub_service::{NotificationDispatcher, NotificationRules, RetentionSettings};

use crate::error::JobError;
use crate::job::{JobName, NotificationJob, RunCounts};
use crate::tracker::JobTracker;

/// Types the review phase never selects; reviewing them would only
/// produce reminders about reminders.
const SELF_GENERATED: [NotificationType; 2] =
    [NotificationType::AdminReminder, NotificationType::CleanupReport];

/// Advances notifications through `pending_review` and `extended`.
pub struct LifecycleJob {
    store: Arc<dyn NotificationStore>,
    dispatcher: NotificationDispatcher,
    rules: NotificationRules,
    settings: RetentionSettings,
    config: LifecycleConfig,
    tracker: JobTracker,
}

impl std::fmt::Debug for LifecycleJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleJob")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl LifecycleJob {
    /// Creates a new lifecycle job.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        dispatcher: NotificationDispatcher,
        rules: NotificationRules,
        settings: RetentionSettings,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            rules,
            settings,
            config,
            tracker: JobTracker::new(),
        }
    }

    /// Cron expression the scheduler registers this job under.
    pub fn cron(&self) -> &str {
        &self.config.cron
    }

    /// Run both phases at `now`.
    pub async fn advance(&self, now: DateTime<Utc>) -> Result<RunCounts, JobError> {
        let mut counts = RunCounts::from([
            ("moved_to_review", 0),
            ("reminders_sent", 0),
            ("reminders_failed", 0),
            ("extended", 0),
            ("failed", 0),
        ]);

        let review = NotificationFilter {
            reminder_sent: Some(false),
            ..NotificationFilter::new()
                .with_statuses([LifecycleStatus::Active])
                .admin_managed()
                .created_before(days_before(now, self.config.review_age_days)?)
                .excluding_types(SELF_GENERATED.to_vec())
        };
        self.in_batches(&review, &mut counts, |n| self.move_to_review(n, now))
            .await?;

        let important = self.settings.current().await.important_notification_types;
        if !important.is_empty() {
            let extend = NotificationFilter {
                types: Some(important),
                extended: Some(false),
                ..NotificationFilter::new()
                    .with_statuses([LifecycleStatus::PendingReview])
                    .admin_managed()
            };
            self.in_batches(&extend, &mut counts, |n| self.extend(n, now))
                .await?;
        }
        Ok(counts)
    }

    /// Process every match oldest first, in batches with a pause between
    /// them. Each item either leaves the filter or counts as failed, so
    /// failures are skipped by offset on the next fetch.
    async fn in_batches<'a, F, Fut>(
        &'a self,
        filter: &NotificationFilter,
        counts: &mut RunCounts,
        mut step: F,
    ) -> Result<(), JobError>
    where
        F: FnMut(Notification) -> Fut,
        Fut: Future<Output = Result<StepOutcome, JobError>> + 'a,
    {
        let batch_size = u64::from(self.config.batch_size.max(1));
        let pause = StdDuration::from_millis(self.config.batch_pause_ms);
        let mut offset = 0;
        let mut first = true;

        loop {
            let batch = self
                .store
                .find(filter, SortDirection::Asc, Some(batch_size), offset)
                .await?;
            if batch.is_empty() {
                break;
            }
            if !first && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            first = false;

            let len = batch.len() as u64;
            for notification in batch {
                let id = notification.id;
                match step(notification).await {
                    Ok(StepOutcome::Advanced { key, reminder }) => {
                        *counts.entry(key).or_insert(0) += 1;
                        if let Some(reminder) = reminder {
                            *counts.entry(reminder.counter()).or_insert(0) += 1;
                        }
                    }
                    Ok(StepOutcome::Skipped) => offset += 1,
                    Err(e) => {
                        offset += 1;
                        *counts.entry("failed").or_insert(0) += 1;
                        warn!(notification_id = %id, error = %e, "Lifecycle step failed");
                    }
                }
            }
            if len < batch_size {
                break;
            }
        }
        Ok(())
    }

    async fn move_to_review(
        &self,
        notification: Notification,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, JobError> {
        if !self.store.mark_pending_review(notification.id, now).await? {
            debug!(notification_id = %notification.id, "Already left active; skipped");
            return Ok(StepOutcome::Skipped);
        }

        // The transition stands even if the reminder fails.
        let reminder = match self.send_reminder(&notification, now).await {
            Ok(true) => Some(Reminder::Sent),
            Ok(false) => None,
            Err(e) => {
                warn!(
                    notification_id = %notification.id,
                    error = %e,
                    "Failed to send review reminder"
                );
                Some(Reminder::Failed)
            }
        };
        Ok(StepOutcome::Advanced {
            key: "moved_to_review",
            reminder,
        })
    }

    async fn send_reminder(
        &self,
        notification: &Notification,
        now: DateTime<Utc>,
    ) -> Result<bool, JobError> {
        let admins = self.rules.admins().await?;
        let draft = NewNotification::new(
            NotificationType::AdminReminder,
            "Notification awaiting review",
            format!(
                "\"{}\" is {} days old and needs review",
                notification.title,
                notification.age_days_at(now)
            ),
            admins,
        )
        .with_group(format!("admin_reminder_{}", now.format("%Y-%m-%d")))
        .with_metadata(json!({
            "original_id": notification.id,
            "original_type": notification.notification_type,
            "original_title": notification.title,
            "original_created_at": notification.created_at,
        }));
        Ok(self.dispatcher.dispatch(draft).await?.is_some())
    }

    async fn extend(
        &self,
        notification: Notification,
        now: DateTime<Utc>,
    ) -> Result<StepOutcome, JobError> {
        let until = now + Duration::days(self.config.extension_days);
        let entry = json!({
            "extended_at": now,
            "extended_until": until,
            "days": self.config.extension_days,
            "source": "lifecycle",
        });
        if self.store.extend(notification.id, until, entry).await? {
            Ok(StepOutcome::Advanced {
                key: "extended",
                reminder: None,
            })
        } else {
            Ok(StepOutcome::Skipped)
        }
    }
}

enum StepOutcome {
    Advanced {
        key: &'static str,
        reminder: Option<Reminder>,
    },
    Skipped,
}

enum Reminder {
    Sent,
    Failed,
}

impl Reminder {
    fn counter(&self) -> &'static str {
        match self {
            Self::Sent => "reminders_sent",
            Self::Failed => "reminders_failed",
        }
    }
}

#[async_trait]
impl NotificationJob for LifecycleJob {
    fn name(&self) -> JobName {
        JobName::Lifecycle
    }

    fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    async fn execute(&self) -> Result<RunCounts, JobError> {
        let counts = self.advance(Utc::now()).await?;
        info!(
            moved_to_review = counts["moved_to_review"],
            extended = counts["extended"],
            reminders_failed = counts["reminders_failed"],
            "Lifecycle pass finished"
        );
        Ok(counts)
    }
}
