//! Admin notification management: creation, aggregation, review, bulk
//! deletion, manual extension, and analytics.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use movehub_core::config::MAX_RETENTION_DAYS;
use movehub_core::error::AppError;
use movehub_core::types::{
    LifecycleStatus, NotificationId, NotificationPriority, NotificationType, PageRequest,
    PageResponse, UserId, days_before,
};
use movehub_database::store::{DailyCount, GroupBy, GroupCount, StorageEstimate};
use movehub_database::{DirectoryStore, NotificationFilter, NotificationStore, SortDirection};
use movehub_entity::notification::{NewNotification, Notification};

use crate::context::RequestContext;
use crate::notification::dispatch::NotificationDispatcher;

/// Deletes are issued in chunks of this many ids.
const DELETE_CHUNK: usize = 500;
/// Longest manual extension in days.
const MAX_EXTENSION_DAYS: i64 = 365;
/// Longest analytics window in days.
const MAX_ANALYTICS_DAYS: i64 = 365;

/// Request to create a notification on behalf of an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationRequest {
    /// Recipients; each must exist and be active.
    pub recipient_ids: Vec<UserId>,
    /// Notification type.
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Priority; the type's default when omitted.
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    /// Opaque payload.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Call-to-action link.
    #[serde(default)]
    pub action_url: Option<String>,
    /// Call-to-action label.
    #[serde(default)]
    pub action_text: Option<String>,
    /// Correlation key.
    #[serde(default)]
    pub notification_group: Option<String>,
}

/// Criteria for a bulk delete. At least one field must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkDeleteCriteria {
    /// Lifecycle status equals.
    pub status: Option<LifecycleStatus>,
    /// Type equals.
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    /// Read by every recipient (`true`) or not (`false`).
    pub read: Option<bool>,
    /// Created more than this many days ago.
    pub older_than_days: Option<i64>,
}

impl BulkDeleteCriteria {
    fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.notification_type.is_none()
            && self.read.is_none()
            && self.older_than_days.is_none()
    }
}

/// Bulk delete by explicit ids or by criteria.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkDeleteRequest {
    /// Explicit ids.
    #[serde(default)]
    pub ids: Option<Vec<NotificationId>>,
    /// Criteria, used when `ids` is absent.
    #[serde(default)]
    pub criteria: Option<BulkDeleteCriteria>,
    /// Must be `true`.
    #[serde(default)]
    pub confirm: bool,
}

/// Result of a bulk delete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BulkDeleteResult {
    /// Notifications matched.
    pub matched: u64,
    /// Notifications removed.
    pub deleted: u64,
}

/// Notification counts for the analytics window.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    /// Window length in days.
    pub days: i64,
    /// Start of the window.
    pub since: DateTime<Utc>,
    /// Notifications created in the window.
    pub total: u64,
    /// Counts per type.
    pub by_type: Vec<GroupCount>,
    /// Counts per lifecycle status.
    pub by_status: Vec<GroupCount>,
    /// Counts per day.
    pub by_day: Vec<DailyCount>,
    /// Current storage footprint.
    pub storage: StorageEstimate,
}

/// Admin-only notification management.
#[derive(Clone)]
pub struct AdminNotificationService {
    store: Arc<dyn NotificationStore>,
    directory: Arc<dyn DirectoryStore>,
    dispatcher: NotificationDispatcher,
}

impl std::fmt::Debug for AdminNotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminNotificationService").finish_non_exhaustive()
    }
}

impl AdminNotificationService {
    /// Creates a new admin notification service.
    pub fn new(
        store: Arc<dyn NotificationStore>,
        directory: Arc<dyn DirectoryStore>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            store,
            directory,
            dispatcher,
        }
    }

    /// Creates one fanned-out notification.
    ///
    /// Every recipient must exist and be active; otherwise nothing is
    /// written and the offending ids are reported.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        req: CreateNotificationRequest,
    ) -> Result<Notification, AppError> {
        ctx.require_admin()?;

        if req.recipient_ids.is_empty() {
            return Err(AppError::validation("recipient_ids must not be empty"));
        }
        if req.title.trim().is_empty() || req.message.trim().is_empty() {
            return Err(AppError::validation("title and message are required"));
        }

        let unique: Vec<UserId> = {
            let mut seen = HashSet::new();
            req.recipient_ids
                .iter()
                .copied()
                .filter(|id| seen.insert(*id))
                .collect()
        };
        let found = self.directory.find_users(&unique).await?;
        let invalid: Vec<String> = unique
            .iter()
            .filter(|id| !found.iter().any(|u| u.id == **id && u.is_active()))
            .map(|id| id.to_string())
            .collect();
        if !invalid.is_empty() {
            return Err(AppError::validation(format!(
                "Unknown or inactive recipients: {}",
                invalid.join(", ")
            )));
        }

        let mut draft = NewNotification::new(req.notification_type, req.title, req.message, unique)
            .with_actor(Some(ctx.user_id));
        draft.priority = req.priority;
        draft.action_url = req.action_url;
        draft.action_text = req.action_text;
        draft.notification_group = req.notification_group;
        if let Some(metadata) = req.metadata {
            draft.metadata = metadata;
        }

        let created = self
            .dispatcher
            .dispatch(draft)
            .await?
            .ok_or_else(|| AppError::internal("Notification was not created"))?;

        info!(
            admin_id = %ctx.user_id,
            notification_id = %created.id,
            recipients = created.recipient_ids.len(),
            "Admin created notification"
        );
        Ok(created)
    }

    /// Group summaries, largest group first.
    pub async fn groups(
        &self,
        ctx: &RequestContext,
        group_by: GroupBy,
        page: PageRequest,
    ) -> Result<PageResponse<GroupCount>, AppError> {
        ctx.require_admin()?;
        let page = page.normalized();
        let all = self
            .store
            .group_counts(&NotificationFilter::new(), group_by)
            .await?;
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .collect();
        Ok(PageResponse::new(items, &page, total))
    }

    /// Notifications awaiting review, oldest first: `pending_review` plus
    /// extended notifications whose extension has run out.
    pub async fn pending_review(
        &self,
        ctx: &RequestContext,
        page: PageRequest,
    ) -> Result<PageResponse<Notification>, AppError> {
        ctx.require_admin()?;
        let page = page.normalized();
        let filter = NotificationFilter {
            needs_review_at: Some(Utc::now()),
            ..Default::default()
        };
        let total = self.store.count(&filter).await?;
        let items = self
            .store
            .find(&filter, SortDirection::Asc, Some(page.limit()), page.offset())
            .await?;
        Ok(PageResponse::new(items, &page, total))
    }

    /// Deletes by id list or criteria. Requires `confirm: true`.
    pub async fn bulk_delete(
        &self,
        ctx: &RequestContext,
        req: BulkDeleteRequest,
    ) -> Result<BulkDeleteResult, AppError> {
        ctx.require_admin()?;
        if !req.confirm {
            return Err(AppError::validation(
                "Bulk delete requires explicit confirmation (confirm: true)",
            ));
        }

        let ids: Vec<NotificationId> = match (req.ids, req.criteria) {
            (Some(ids), _) if !ids.is_empty() => ids,
            (Some(_), None) | (None, None) => {
                return Err(AppError::validation("Provide ids or criteria to delete"));
            }
            (_, Some(criteria)) => {
                if criteria.is_empty() {
                    return Err(AppError::validation("Bulk delete criteria must not be empty"));
                }
                if criteria
                    .older_than_days
                    .is_some_and(|d| !(0..=MAX_RETENTION_DAYS).contains(&d))
                {
                    return Err(AppError::validation(format!(
                        "older_than_days must be between 0 and {MAX_RETENTION_DAYS}"
                    )));
                }
                let created_before = criteria
                    .older_than_days
                    .map(|d| days_before(Utc::now(), d))
                    .transpose()?;
                let filter = NotificationFilter {
                    statuses: criteria.status.map(|s| vec![s]),
                    types: criteria.notification_type.map(|t| vec![t]),
                    is_read_by_all: criteria.read,
                    created_before,
                    ..Default::default()
                };
                self.store
                    .find(&filter, SortDirection::Asc, None, 0)
                    .await?
                    .into_iter()
                    .map(|n| n.id)
                    .collect()
            }
        };

        let mut deleted = 0;
        for chunk in ids.chunks(DELETE_CHUNK) {
            deleted += self.store.delete(chunk).await?;
        }

        warn!(
            admin_id = %ctx.user_id,
            matched = ids.len(),
            deleted,
            "Bulk deleted notifications"
        );
        Ok(BulkDeleteResult {
            matched: ids.len() as u64,
            deleted,
        })
    }

    /// Extends a notification by `days` from its current expiry (or from
    /// now, whichever is later) and marks it `extended`.
    pub async fn extend(
        &self,
        ctx: &RequestContext,
        id: NotificationId,
        days: i64,
    ) -> Result<Notification, AppError> {
        ctx.require_admin()?;
        if !(1..=MAX_EXTENSION_DAYS).contains(&days) {
            return Err(AppError::validation(format!(
                "days must be between 1 and {MAX_EXTENSION_DAYS}"
            )));
        }

        let current = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Notification {id} not found")))?;
        if current.is_archived() {
            return Err(AppError::conflict("Archived notifications cannot be extended"));
        }

        let now = Utc::now();
        let base = current.extended_until.unwrap_or(current.expires_at).max(now);
        let until = base + Duration::days(days);
        let entry = serde_json::json!({
            "extended_at": now,
            "extended_until": until,
            "days": days,
            "source": "admin",
            "admin_id": ctx.user_id,
        });

        if !self.store.extend(id, until, entry).await? {
            return Err(AppError::conflict(format!(
                "Notification {id} could not be extended"
            )));
        }
        info!(admin_id = %ctx.user_id, notification_id = %id, days, "Notification extended");

        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Notification {id} not found")))
    }

    /// Counts by type, status, and day over the last `days` days.
    pub async fn analytics(
        &self,
        ctx: &RequestContext,
        days: i64,
    ) -> Result<AnalyticsReport, AppError> {
        ctx.require_admin()?;
        if !(1..=MAX_ANALYTICS_DAYS).contains(&days) {
            return Err(AppError::validation(format!(
                "days must be between 1 and {MAX_ANALYTICS_DAYS}"
            )));
        }
        let since = Utc::now() - Duration::days(days);
        let window = NotificationFilter {
            created_after: Some(since),
            ..Default::default()
        };

        Ok(AnalyticsReport {
            days,
            since,
            total: self.store.count(&window).await?,
            by_type: self.store.group_counts(&window, GroupBy::Type).await?,
            by_status: self.store.group_counts(&window, GroupBy::Status).await?,
            by_day: self.store.daily_counts(since).await?,
            storage: self.store.storage_estimate().await?,
        })
    }
}
