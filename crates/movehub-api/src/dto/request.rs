//! Request DTOs with validation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use movehub_core::events::EntityKind;
use movehub_core::types::{NotificationPriority, NotificationType, PageRequest, UserId};
use movehub_database::store::GroupBy;
use movehub_service::notification::admin::CreateNotificationRequest;
use movehub_service::notification::service::NotificationQuery;

/// Query for the recipient listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListNotificationsQuery {
    /// Only read (`true`) or unread (`false`).
    pub read: Option<bool>,
    /// Only this type.
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    /// Only this priority.
    pub priority: Option<NotificationPriority>,
    /// Page number.
    pub page: Option<u64>,
    /// Items per page.
    pub page_size: Option<u64>,
}

impl ListNotificationsQuery {
    /// Split into the service filter and the page.
    pub fn into_parts(self) -> (NotificationQuery, PageRequest) {
        let defaults = PageRequest::default();
        (
            NotificationQuery {
                read: self.read,
                notification_type: self.notification_type,
                priority: self.priority,
            },
            PageRequest::new(
                self.page.unwrap_or(defaults.page),
                self.page_size.unwrap_or(defaults.page_size),
            ),
        )
    }
}

/// Admin notification creation body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateNotificationBody {
    /// Recipients.
    #[validate(length(min = 1, max = 1000, message = "At least one recipient is required"))]
    pub recipient_ids: Vec<UserId>,
    /// Notification type.
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Title.
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    /// Body text.
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    /// Priority.
    pub priority: Option<NotificationPriority>,
    /// Opaque payload.
    pub metadata: Option<serde_json::Value>,
    /// Call-to-action link.
    #[validate(length(max = 500))]
    pub action_url: Option<String>,
    /// Call-to-action label.
    #[validate(length(max = 100))]
    pub action_text: Option<String>,
    /// Correlation key.
    #[validate(length(max = 200))]
    pub notification_group: Option<String>,
}

impl From<CreateNotificationBody> for CreateNotificationRequest {
    fn from(body: CreateNotificationBody) -> Self {
        Self {
            recipient_ids: body.recipient_ids,
            notification_type: body.notification_type,
            title: body.title,
            message: body.message,
            priority: body.priority,
            metadata: body.metadata,
            action_url: body.action_url,
            action_text: body.action_text,
            notification_group: body.notification_group,
        }
    }
}

/// Query for group summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupsQuery {
    /// Grouping dimension (default: group).
    #[serde(default)]
    pub group_by: GroupBy,
    /// Page number.
    pub page: Option<u64>,
    /// Items per page.
    pub page_size: Option<u64>,
}

/// Manual extension body.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ExtendBody {
    /// Days to extend by.
    #[validate(range(min = 1, max = 365))]
    pub days: i64,
}

/// Query for analytics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    /// Window in days (default: 30).
    #[serde(default = "default_analytics_days")]
    pub days: i64,
}

fn default_analytics_days() -> i64 {
    30
}

/// Manual capture trigger body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureTriggerBody {
    /// Entity kind.
    pub entity: EntityKind,
    /// Entity id.
    pub id: Uuid,
}
