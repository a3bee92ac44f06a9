//! Notification vocabulary shared by the entity, store, service, and worker layers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Domain event kinds a notification can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A user account was created.
    UserCreated,
    /// A user account was changed (generic diff).
    UserUpdated,
    /// A user account was removed.
    UserDeleted,
    /// A user account was suspended.
    UserSuspended,
    /// A user account was (re)activated.
    UserActivated,
    /// A user's role changed.
    UserRoleChanged,
    /// A newly created user has missing profile fields.
    ProfileIncomplete,
    /// A quotation or receipt was created.
    DocumentCreated,
    /// A quotation or receipt was changed (generic diff).
    DocumentUpdated,
    /// A quotation or receipt was removed.
    DocumentDeleted,
    /// A quotation was converted into a job.
    QuotationConverted,
    /// A sent quotation passed its validity date.
    QuotationExpired,
    /// A receipt was fully paid.
    PaymentReceived,
    /// A receipt passed its due date unpaid.
    PaymentOverdue,
    /// Security-relevant event.
    SecurityAlert,
    /// Planned maintenance announcement.
    SystemMaintenance,
    /// Reminder asking admins to review an aged notification.
    AdminReminder,
    /// Summary produced by the retention cleanup job.
    CleanupReport,
    /// Operational alert raised by the system itself.
    SystemAlert,
    /// Free-form notification created by an admin.
    Custom,
}

impl NotificationType {
    /// All variants, in declaration order.
    pub const ALL: [NotificationType; 20] = [
        Self::UserCreated,
        Self::UserUpdated,
        Self::UserDeleted,
        Self::UserSuspended,
        Self::UserActivated,
        Self::UserRoleChanged,
        Self::ProfileIncomplete,
        Self::DocumentCreated,
        Self::DocumentUpdated,
        Self::DocumentDeleted,
        Self::QuotationConverted,
        Self::QuotationExpired,
        Self::PaymentReceived,
        Self::PaymentOverdue,
        Self::SecurityAlert,
        Self::SystemMaintenance,
        Self::AdminReminder,
        Self::CleanupReport,
        Self::SystemAlert,
        Self::Custom,
    ];

    /// Return the type as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCreated => "user_created",
            Self::UserUpdated => "user_updated",
            Self::UserDeleted => "user_deleted",
            Self::UserSuspended => "user_suspended",
            Self::UserActivated => "user_activated",
            Self::UserRoleChanged => "user_role_changed",
            Self::ProfileIncomplete => "profile_incomplete",
            Self::DocumentCreated => "document_created",
            Self::DocumentUpdated => "document_updated",
            Self::DocumentDeleted => "document_deleted",
            Self::QuotationConverted => "quotation_converted",
            Self::QuotationExpired => "quotation_expired",
            Self::PaymentReceived => "payment_received",
            Self::PaymentOverdue => "payment_overdue",
            Self::SecurityAlert => "security_alert",
            Self::SystemMaintenance => "system_maintenance",
            Self::AdminReminder => "admin_reminder",
            Self::CleanupReport => "cleanup_report",
            Self::SystemAlert => "system_alert",
            Self::Custom => "custom",
        }
    }

    /// Default priority for notifications of this type.
    pub fn default_priority(&self) -> NotificationPriority {
        match self {
            Self::SecurityAlert | Self::PaymentOverdue => NotificationPriority::Urgent,
            Self::UserSuspended
            | Self::UserRoleChanged
            | Self::QuotationExpired
            | Self::SystemMaintenance
            | Self::SystemAlert => NotificationPriority::High,
            Self::CleanupReport | Self::UserUpdated | Self::DocumentUpdated => {
                NotificationPriority::Low
            }
            _ => NotificationPriority::Normal,
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::validation(format!("Invalid notification type: '{s}'")))
    }
}

/// Presentation priority of a notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    /// Background information.
    Low,
    /// Standard events.
    #[default]
    Normal,
    /// Important events.
    High,
    /// Requires immediate attention.
    Urgent,
}

impl NotificationPriority {
    /// Return the priority as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

impl fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationPriority {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(AppError::validation(format!(
                "Invalid priority: '{s}'. Expected one of: low, normal, high, urgent"
            ))),
        }
    }
}

/// Retention stage of a notification.
///
/// Stages only move forward: `active → pending_review → extended | archived`.
/// Deletion removes the record and is not a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Freshly created and visible to recipients.
    #[default]
    Active,
    /// Aged past the review threshold; admins were reminded.
    PendingReview,
    /// Kept beyond the review threshold because its type is important.
    Extended,
    /// Hidden from recipients and waiting for deletion.
    Archived,
}

impl LifecycleStatus {
    /// Return the status as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PendingReview => "pending_review",
            Self::Extended => "extended",
            Self::Archived => "archived",
        }
    }

    /// Position along the lifecycle; `extended` and `archived` are siblings.
    fn rank(&self) -> u8 {
        match self {
            Self::Active => 0,
            Self::PendingReview => 1,
            Self::Extended | Self::Archived => 2,
        }
    }

    /// Whether moving from `self` to `next` respects lifecycle monotonicity.
    pub fn can_transition_to(&self, next: LifecycleStatus) -> bool {
        if *self == next {
            return true;
        }
        match (self, next) {
            (Self::Archived, _) => false,
            (Self::Extended, Self::Archived) => false,
            _ => next.rank() > self.rank() || next == Self::Archived,
        }
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "pending_review" => Ok(Self::PendingReview),
            "extended" => Ok(Self::Extended),
            "archived" => Ok(Self::Archived),
            _ => Err(AppError::validation(format!(
                "Invalid lifecycle status: '{s}'. Expected one of: active, pending_review, extended, archived"
            ))),
        }
    }
}
