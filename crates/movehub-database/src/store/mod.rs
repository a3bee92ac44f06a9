//! Store traits for notifications, upstream entities, and settings.
//!
//! Two implementations exist for each trait:
//! - PostgreSQL (`repositories`)
//! - In-memory (`memory`, using `tokio::sync::RwLock`)

pub mod filter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use movehub_core::result::AppResult;
use movehub_core::types::{NotificationId, QuotationId, ReceiptId, UserId};
use movehub_entity::document::{Quotation, Receipt};
use movehub_entity::notification::Notification;
use movehub_entity::settings::NotificationSetting;
use movehub_entity::user::User;

pub use filter::{
    DailyCount, GroupBy, GroupCount, NotificationFilter, SortDirection, StorageEstimate,
};

/// Durable collection of notification records.
///
/// Batch writes take an id list and re-check the state they transition
/// from, so repeating an interrupted batch is safe.
#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    /// Insert a new notification.
    async fn insert(&self, notification: &Notification) -> AppResult<()>;

    /// Fetch one notification.
    async fn get(&self, id: NotificationId) -> AppResult<Option<Notification>>;

    /// Query notifications ordered by `created_at`.
    async fn find(
        &self,
        filter: &NotificationFilter,
        sort: SortDirection,
        limit: Option<u64>,
        offset: u64,
    ) -> AppResult<Vec<Notification>>;

    /// Count notifications matching the filter.
    async fn count(&self, filter: &NotificationFilter) -> AppResult<u64>;

    /// Add a read receipt for a recipient and refresh `is_read_by_all`.
    ///
    /// Returns `false` when the user is not a recipient or already read it.
    async fn add_read_receipt(
        &self,
        id: NotificationId,
        user: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Remove a recipient's read receipt and refresh `is_read_by_all`.
    ///
    /// Returns `false` when there was no receipt.
    async fn remove_read_receipt(&self, id: NotificationId, user: UserId) -> AppResult<bool>;

    /// Overwrite the cached read flag for a batch.
    async fn set_read_by_all(&self, ids: &[NotificationId], value: bool) -> AppResult<u64>;

    /// Move an unreminded active notification to `pending_review`.
    async fn mark_pending_review(&self, id: NotificationId, at: DateTime<Utc>)
    -> AppResult<bool>;

    /// Extend a non-archived notification until `until`, appending
    /// `entry` to `metadata.extension_history`.
    async fn extend(
        &self,
        id: NotificationId,
        until: DateTime<Utc>,
        entry: serde_json::Value,
    ) -> AppResult<bool>;

    /// Archive active or pending-review notifications in the batch.
    async fn archive(
        &self,
        ids: &[NotificationId],
        at: DateTime<Utc>,
        reason: &str,
    ) -> AppResult<u64>;

    /// Delete the batch.
    async fn delete(&self, ids: &[NotificationId]) -> AppResult<u64>;

    /// Per-group aggregates for matching notifications, largest first.
    async fn group_counts(
        &self,
        filter: &NotificationFilter,
        group_by: GroupBy,
    ) -> AppResult<Vec<GroupCount>>;

    /// Notifications created per UTC day since `since`, oldest day first.
    async fn daily_counts(&self, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>>;

    /// Size of the whole collection.
    async fn storage_estimate(&self) -> AppResult<StorageEstimate>;
}

/// Read-only view of the upstream entities.
#[async_trait]
pub trait DirectoryStore: Send + Sync + 'static {
    /// Fetch a user.
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>>;

    /// Fetch several users; unknown ids are skipped.
    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<User>>;

    /// Ids of active admins.
    async fn active_admin_ids(&self) -> AppResult<Vec<UserId>>;

    /// Ids of all active users.
    async fn active_user_ids(&self) -> AppResult<Vec<UserId>>;

    /// Fetch a quotation.
    async fn find_quotation(&self, id: QuotationId) -> AppResult<Option<Quotation>>;

    /// Fetch a receipt.
    async fn find_receipt(&self, id: ReceiptId) -> AppResult<Option<Receipt>>;

    /// Sent quotations whose validity ended before `now`.
    async fn expired_quotations(&self, now: DateTime<Utc>) -> AppResult<Vec<Quotation>>;

    /// Unpaid receipts whose due date passed before `now`.
    async fn overdue_receipts(&self, now: DateTime<Utc>) -> AppResult<Vec<Receipt>>;
}

/// Key-value settings persistence.
#[async_trait]
pub trait SettingsStore: Send + Sync + 'static {
    /// Load a settings row.
    async fn load(&self, key: &str) -> AppResult<Option<NotificationSetting>>;

    /// Insert or replace a settings row.
    async fn save(&self, setting: &NotificationSetting) -> AppResult<()>;
}
