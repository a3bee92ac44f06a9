//! Notification subsystem configuration: retention policy, job timing,
//! and event capture.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::NotificationType;

/// Notification subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Initial retention policy (a persisted settings row overrides it).
    #[serde(default)]
    pub retention: RetentionPolicy,
    /// Lifecycle advancement job settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Read reconciliation job settings.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Cleanup job timer.
    #[serde(default)]
    pub cleanup: CleanupScheduleConfig,
    /// Event capture adapter settings.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Days until a newly created notification expires.
    #[serde(default = "default_expiry_days")]
    pub default_expiry_days: i64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            lifecycle: LifecycleConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            cleanup: CleanupScheduleConfig::default(),
            capture: CaptureConfig::default(),
            default_expiry_days: default_expiry_days(),
        }
    }
}

/// Storage retention policy enforced by the cleanup job.
///
/// A value of this type is handed to the cleanup job on every run, so an
/// update through the settings endpoint takes effect on the next run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Age after which active/pending notifications are archived.
    pub min_age_for_archiving_days: i64,
    /// Age after which archived notifications are deleted.
    pub min_age_for_deletion_days: i64,
    /// Age after which fully-read active notifications are deleted.
    pub max_retention_days: i64,
    /// When false, non-archived notifications past the deletion age are deleted too.
    pub archive_before_delete: bool,
    /// Exclude important types from every archive/delete rule.
    pub preserve_important_notifications: bool,
    /// Types treated as important.
    pub important_notification_types: Vec<NotificationType>,
    /// Upper bound on archived records.
    pub max_archive_size: u64,
    /// Per-step batch limit.
    pub notification_batch_size: u32,
    /// Master switch for the cleanup job.
    pub enable_auto_cleanup: bool,
    /// Delete fully-read active notifications past `max_retention_days`.
    pub auto_delete_read_notifications: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            min_age_for_archiving_days: 60,
            min_age_for_deletion_days: 180,
            max_retention_days: 90,
            archive_before_delete: true,
            preserve_important_notifications: true,
            important_notification_types: vec![
                NotificationType::SecurityAlert,
                NotificationType::SystemMaintenance,
                NotificationType::PaymentOverdue,
            ],
            max_archive_size: 10_000,
            notification_batch_size: 100,
            enable_auto_cleanup: true,
            auto_delete_read_notifications: false,
        }
    }
}

impl RetentionPolicy {
    /// Whether a notification of this type is shielded from cleanup.
    pub fn is_preserved(&self, notification_type: NotificationType) -> bool {
        self.preserve_important_notifications && self.is_important(notification_type)
    }

    /// Whether the type is listed as important, regardless of preservation.
    pub fn is_important(&self, notification_type: NotificationType) -> bool {
        self.important_notification_types.contains(&notification_type)
    }

    /// Types every cleanup query must exclude.
    pub fn excluded_types(&self) -> Vec<NotificationType> {
        if self.preserve_important_notifications {
            self.important_notification_types.clone()
        } else {
            Vec::new()
        }
    }

    /// Check the policy for values that would make cleanup misbehave.
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("min_age_for_archiving_days", self.min_age_for_archiving_days),
            ("min_age_for_deletion_days", self.min_age_for_deletion_days),
            ("max_retention_days", self.max_retention_days),
        ] {
            if !(1..=MAX_RETENTION_DAYS).contains(&value) {
                return Err(AppError::validation(format!(
                    "{field} must be between 1 and {MAX_RETENTION_DAYS}"
                )));
            }
        }
        if self.min_age_for_deletion_days < self.min_age_for_archiving_days {
            return Err(AppError::validation(
                "min_age_for_deletion_days must not be less than min_age_for_archiving_days",
            ));
        }
        if self.notification_batch_size == 0 || self.notification_batch_size > 10_000 {
            return Err(AppError::validation(
                "notification_batch_size must be between 1 and 10000",
            ));
        }
        if self.max_archive_size == 0 {
            return Err(AppError::validation("max_archive_size must be at least 1"));
        }
        Ok(())
    }
}

/// Lifecycle advancement job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Age at which active notifications move to review.
    pub review_age_days: i64,
    /// Days an important notification is extended by.
    pub extension_days: i64,
    /// Notifications per batch.
    pub batch_size: u32,
    /// Pause between batches in milliseconds.
    pub batch_pause_ms: u64,
    /// Six-field cron expression, evaluated in local time.
    pub cron: String,
    /// Run once immediately after start (ignored in production).
    pub run_on_start: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            review_age_days: 30,
            extension_days: 30,
            batch_size: 100,
            batch_pause_ms: 200,
            cron: "0 0 2 * * *".to_string(),
            run_on_start: false,
        }
    }
}

/// Read reconciliation job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Seconds between runs.
    pub interval_secs: u64,
    /// Seconds to wait after start before the first run.
    pub startup_delay_secs: u64,
    /// Notifications per batch.
    pub batch_size: u32,
    /// Minimum hours between opportunistic cleanup runs.
    pub cleanup_min_spacing_hours: i64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            startup_delay_secs: 60,
            batch_size: 500,
            cleanup_min_spacing_hours: 6,
        }
    }
}

/// Cleanup job timer. The retention policy itself lives in
/// [`RetentionPolicy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupScheduleConfig {
    /// Seconds between scheduled runs.
    pub interval_secs: u64,
    /// Seconds to wait after start before the first run.
    pub startup_delay_secs: u64,
}

impl Default for CleanupScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 6 * 3600,
            startup_delay_secs: 300,
        }
    }
}

/// Event capture adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Start the adapter with the scheduler.
    pub enabled: bool,
    /// Try the live change feed before falling back to polling.
    pub prefer_change_feed: bool,
    /// Seconds before the first poll in fallback mode.
    pub poll_initial_delay_secs: u64,
    /// Seconds between polls in fallback mode.
    pub poll_interval_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefer_change_feed: true,
            poll_initial_delay_secs: 30,
            poll_interval_secs: 600,
        }
    }
}

/// Upper bound for every day-count in the retention policy.
pub const MAX_RETENTION_DAYS: i64 = 36_500;

fn default_expiry_days() -> i64 {
    30
}
