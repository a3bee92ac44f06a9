//! Recipient-facing notification queries and read-state changes.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use movehub_core::error::AppError;
use movehub_core::types::{
    LifecycleStatus, NotificationId, NotificationPriority, NotificationType, PageRequest,
    PageResponse,
};
use movehub_database::{NotificationFilter, NotificationStore, SortDirection};
use movehub_entity::notification::Notification;

use crate::context::RequestContext;

/// Statuses visible to recipients.
const VISIBLE_STATUSES: [LifecycleStatus; 3] = [
    LifecycleStatus::Active,
    LifecycleStatus::PendingReview,
    LifecycleStatus::Extended,
];

/// Optional filters on the recipient listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationQuery {
    /// Only read (`true`) or unread (`false`) by the caller.
    pub read: Option<bool>,
    /// Only this type.
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    /// Only this priority.
    pub priority: Option<NotificationPriority>,
}

/// A notification as one recipient sees it.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientNotification {
    /// The notification record.
    #[serde(flatten)]
    pub notification: Notification,
    /// Whether the caller has read it.
    pub is_read: bool,
}

/// Outcome of a read-state mutation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReadStateChange {
    /// The notification touched.
    pub id: NotificationId,
    /// The caller's read state afterwards.
    pub is_read: bool,
    /// Whether anything was written.
    pub changed: bool,
}

/// Manages the caller's own notifications.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService").finish_non_exhaustive()
    }
}

impl NotificationService {
    /// Creates a new notification service.
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// Lists the caller's non-archived notifications, newest first.
    pub async fn list_notifications(
        &self,
        ctx: &RequestContext,
        query: &NotificationQuery,
        page: PageRequest,
    ) -> Result<PageResponse<RecipientNotification>, AppError> {
        let page = page.normalized();
        let filter = NotificationFilter {
            recipient: Some(ctx.user_id),
            recipient_has_read: query.read,
            types: query.notification_type.map(|t| vec![t]),
            priority: query.priority,
            statuses: Some(VISIBLE_STATUSES.to_vec()),
            ..Default::default()
        };

        let total = self.store.count(&filter).await?;
        let items = self
            .store
            .find(&filter, SortDirection::Desc, Some(page.limit()), page.offset())
            .await?;

        let user = ctx.user_id;
        Ok(PageResponse::new(items, &page, total).map(|notification| RecipientNotification {
            is_read: notification.has_read(user),
            notification,
        }))
    }

    /// Counts notifications the caller has not read, excluding expired and
    /// archived ones.
    pub async fn unread_count(&self, ctx: &RequestContext) -> Result<u64, AppError> {
        let filter = NotificationFilter {
            recipient: Some(ctx.user_id),
            recipient_has_read: Some(false),
            not_expired_at: Some(Utc::now()),
            statuses: Some(VISIBLE_STATUSES.to_vec()),
            ..Default::default()
        };
        self.store.count(&filter).await
    }

    /// Marks a notification read for the caller. Idempotent.
    pub async fn mark_read(
        &self,
        ctx: &RequestContext,
        id: NotificationId,
    ) -> Result<ReadStateChange, AppError> {
        self.require_recipient(ctx, id).await?;
        let changed = self
            .store
            .add_read_receipt(id, ctx.user_id, Utc::now())
            .await?;
        debug!(notification_id = %id, user_id = %ctx.user_id, changed, "Marked read");
        Ok(ReadStateChange {
            id,
            is_read: true,
            changed,
        })
    }

    /// Marks a notification unread for the caller. Idempotent.
    pub async fn mark_unread(
        &self,
        ctx: &RequestContext,
        id: NotificationId,
    ) -> Result<ReadStateChange, AppError> {
        self.require_recipient(ctx, id).await?;
        let changed = self.store.remove_read_receipt(id, ctx.user_id).await?;
        debug!(notification_id = %id, user_id = %ctx.user_id, changed, "Marked unread");
        Ok(ReadStateChange {
            id,
            is_read: false,
            changed,
        })
    }

    /// Marks every visible unread notification read for the caller.
    pub async fn mark_all_read(&self, ctx: &RequestContext) -> Result<u64, AppError> {
        let filter = NotificationFilter {
            recipient: Some(ctx.user_id),
            recipient_has_read: Some(false),
            statuses: Some(VISIBLE_STATUSES.to_vec()),
            ..Default::default()
        };
        let unread = self.store.find(&filter, SortDirection::Asc, None, 0).await?;
        let now = Utc::now();
        let mut marked = 0;
        for notification in unread {
            if self
                .store
                .add_read_receipt(notification.id, ctx.user_id, now)
                .await?
            {
                marked += 1;
            }
        }
        info!(user_id = %ctx.user_id, marked, "Marked all notifications read");
        Ok(marked)
    }

    /// Archived notifications and other users' notifications are reported
    /// as missing.
    async fn require_recipient(
        &self,
        ctx: &RequestContext,
        id: NotificationId,
    ) -> Result<Notification, AppError> {
        match self.store.get(id).await? {
            Some(n) if n.is_recipient(ctx.user_id) && !n.is_archived() => Ok(n),
            _ => Err(AppError::not_found(format!("Notification {id} not found"))),
        }
    }
}
