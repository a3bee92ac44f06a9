//! Query vocabulary shared by every notification store implementation.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use movehub_core::types::{
    LifecycleStatus, NotificationId, NotificationPriority, NotificationType, UserId,
};
use movehub_entity::notification::Notification;

/// Conjunctive notification filter. Unset fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    /// Restrict to these ids.
    pub ids: Option<Vec<NotificationId>>,
    /// Lifecycle status is one of these.
    pub statuses: Option<Vec<LifecycleStatus>>,
    /// Type is one of these.
    pub types: Option<Vec<NotificationType>>,
    /// Type is none of these.
    pub exclude_types: Vec<NotificationType>,
    /// Priority equals.
    pub priority: Option<NotificationPriority>,
    /// `admin_managed` equals.
    pub admin_managed: Option<bool>,
    /// Created strictly before.
    pub created_before: Option<DateTime<Utc>>,
    /// Created at or after.
    pub created_after: Option<DateTime<Utc>>,
    /// Recipient set contains this user.
    pub recipient: Option<UserId>,
    /// With `recipient`: whether that recipient has a read receipt.
    pub recipient_has_read: Option<bool>,
    /// Cached `is_read_by_all` equals.
    pub is_read_by_all: Option<bool>,
    /// Expires strictly after.
    pub not_expired_at: Option<DateTime<Utc>>,
    /// Whether `reminder_sent_at` is set.
    pub reminder_sent: Option<bool>,
    /// Whether `extended_until` is set.
    pub extended: Option<bool>,
    /// Awaiting admin review at this instant: `pending_review`, or
    /// `extended` with an elapsed `extended_until`.
    pub needs_review_at: Option<DateTime<Utc>>,
    /// Cached read flag disagrees with the receipts.
    pub read_flag_mismatch: bool,
}

impl NotificationFilter {
    /// Empty filter matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to the given statuses.
    pub fn with_statuses(mut self, statuses: impl Into<Vec<LifecycleStatus>>) -> Self {
        self.statuses = Some(statuses.into());
        self
    }

    /// Exclude the given types.
    pub fn excluding_types(mut self, types: Vec<NotificationType>) -> Self {
        self.exclude_types = types;
        self
    }

    /// Restrict to lifecycle-managed notifications.
    pub fn admin_managed(mut self) -> Self {
        self.admin_managed = Some(true);
        self
    }

    /// Restrict to notifications created before `at`.
    pub fn created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    /// Evaluate the filter against one notification.
    ///
    /// The PostgreSQL repository translates the same predicates to SQL.
    pub fn matches(&self, n: &Notification) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&n.id) {
                return false;
            }
        }
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&n.lifecycle_status) {
                return false;
            }
        }
        if let Some(types) = &self.types {
            if !types.contains(&n.notification_type) {
                return false;
            }
        }
        if self.exclude_types.contains(&n.notification_type) {
            return false;
        }
        if self.priority.is_some_and(|p| p != n.priority) {
            return false;
        }
        if self.admin_managed.is_some_and(|m| m != n.admin_managed) {
            return false;
        }
        if self.created_before.is_some_and(|t| n.created_at >= t) {
            return false;
        }
        if self.created_after.is_some_and(|t| n.created_at < t) {
            return false;
        }
        if let Some(user) = self.recipient {
            if !n.is_recipient(user) {
                return false;
            }
            if self.recipient_has_read.is_some_and(|r| r != n.has_read(user)) {
                return false;
            }
        }
        if self.is_read_by_all.is_some_and(|r| r != n.is_read_by_all) {
            return false;
        }
        if self.not_expired_at.is_some_and(|t| n.expires_at <= t) {
            return false;
        }
        if self
            .reminder_sent
            .is_some_and(|s| s != n.reminder_sent_at.is_some())
        {
            return false;
        }
        if self.extended.is_some_and(|e| e != n.extended_until.is_some()) {
            return false;
        }
        if let Some(now) = self.needs_review_at {
            let pending = n.lifecycle_status == LifecycleStatus::PendingReview;
            if !pending && !n.extension_lapsed_at(now) {
                return false;
            }
        }
        if self.read_flag_mismatch
            && (n.recipient_ids.is_empty() || !n.read_flag_drifted())
        {
            return false;
        }
        true
    }
}

/// Sort direction on `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Oldest first.
    #[default]
    Asc,
    /// Newest first.
    Desc,
}

impl SortDirection {
    /// Return the SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Dimension for admin group summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    /// By `notification_group`.
    #[default]
    Group,
    /// By notification type.
    Type,
    /// By lifecycle status.
    Status,
}

impl GroupBy {
    /// Key of a notification along this dimension.
    pub fn key_of(&self, n: &Notification) -> String {
        match self {
            Self::Group => n
                .notification_group
                .clone()
                .unwrap_or_else(|| "ungrouped".to_string()),
            Self::Type => n.notification_type.to_string(),
            Self::Status => n.lifecycle_status.to_string(),
        }
    }
}

/// Aggregate over one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCount {
    /// Group key.
    pub key: String,
    /// Notifications in the group.
    pub total: u64,
    /// Of those, not yet read by every recipient.
    pub unread: u64,
    /// Newest creation time in the group.
    pub latest_at: DateTime<Utc>,
}

/// Notifications created on one calendar day (UTC).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCount {
    /// Day bucket.
    pub date: NaiveDate,
    /// Notifications created that day.
    pub count: u64,
}

/// Approximate footprint of the notification collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEstimate {
    /// Stored notifications.
    pub count: u64,
    /// Approximate bytes on disk.
    pub approx_bytes: u64,
}
