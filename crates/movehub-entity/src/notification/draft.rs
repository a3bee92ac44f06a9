//! Input for creating a notification.

use movehub_core::types::{NotificationPriority, NotificationType, UserId};
use serde::{Deserialize, Serialize};

/// Everything needed to create a notification; server-side fields are
/// filled in by [`Notification::create`](super::Notification::create).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    /// Domain event kind.
    pub notification_type: NotificationType,
    /// Title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Explicit priority; the type's default when `None`.
    pub priority: Option<NotificationPriority>,
    /// Recipients, possibly with duplicates.
    pub recipient_ids: Vec<UserId>,
    /// Originator.
    pub actor_id: Option<UserId>,
    /// Call-to-action link.
    pub action_url: Option<String>,
    /// Call-to-action label.
    pub action_text: Option<String>,
    /// Correlation key; defaults to type plus day.
    pub notification_group: Option<String>,
    /// Whether the lifecycle jobs manage it.
    pub admin_managed: bool,
    /// Opaque payload.
    pub metadata: serde_json::Value,
}

impl NewNotification {
    /// Start a draft with the required fields.
    pub fn new(
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        recipient_ids: Vec<UserId>,
    ) -> Self {
        Self {
            notification_type,
            title: title.into(),
            message: message.into(),
            priority: None,
            recipient_ids,
            actor_id: None,
            action_url: None,
            action_text: None,
            notification_group: None,
            admin_managed: true,
            metadata: serde_json::Value::Object(Default::default()),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the originator.
    pub fn with_actor(mut self, actor_id: Option<UserId>) -> Self {
        self.actor_id = actor_id;
        self
    }

    /// Set the call-to-action.
    pub fn with_action(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self.action_text = Some(text.into());
        self
    }

    /// Set the correlation key.
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.notification_group = Some(group.into());
        self
    }

    /// Replace the metadata payload.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Opt out of lifecycle management.
    pub fn unmanaged(mut self) -> Self {
        self.admin_managed = false;
        self
    }
}
