//! In-memory notification store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use movehub_core::error::AppError;
use movehub_core::result::AppResult;
use movehub_core::types::{LifecycleStatus, NotificationId, UserId};
use movehub_entity::notification::Notification;

use crate::store::{
    DailyCount, GroupBy, GroupCount, NotificationFilter, NotificationStore, SortDirection,
    StorageEstimate,
};

/// Notifications held in a process-local map.
///
/// Suitable for single-node deployments only; contents are lost on restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryNotificationStore {
    rows: Arc<RwLock<HashMap<NotificationId, Notification>>>,
}

impl MemoryNotificationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored notification, oldest first.
    pub async fn all(&self) -> Vec<Notification> {
        let mut all: Vec<Notification> = self.rows.read().await.values().cloned().collect();
        all.sort_by_key(|n| (n.created_at, n.id));
        all
    }

    /// Replace a stored notification wholesale.
    ///
    /// Bypasses every invariant; meant for seeding fixtures.
    pub async fn put(&self, notification: Notification) {
        self.rows.write().await.insert(notification.id, notification);
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn insert(&self, notification: &Notification) -> AppResult<()> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&notification.id) {
            return Err(AppError::conflict(format!(
                "Notification {} already exists",
                notification.id
            )));
        }
        rows.insert(notification.id, notification.clone());
        Ok(())
    }

    async fn get(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find(
        &self,
        filter: &NotificationFilter,
        sort: SortDirection,
        limit: Option<u64>,
        offset: u64,
    ) -> AppResult<Vec<Notification>> {
        let rows = self.rows.read().await;
        let mut matched: Vec<&Notification> = rows.values().filter(|n| filter.matches(n)).collect();
        matched.sort_by_key(|n| (n.created_at, n.id));
        if sort == SortDirection::Desc {
            matched.reverse();
        }
        let take = limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .skip(offset as usize)
            .take(take)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &NotificationFilter) -> AppResult<u64> {
        let rows = self.rows.read().await;
        Ok(rows.values().filter(|n| filter.matches(n)).count() as u64)
    }

    async fn add_read_receipt(
        &self,
        id: NotificationId,
        user: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        Ok(rows.get_mut(&id).is_some_and(|n| n.mark_read(user, at)))
    }

    async fn remove_read_receipt(&self, id: NotificationId, user: UserId) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        Ok(rows.get_mut(&id).is_some_and(|n| n.mark_unread(user)))
    }

    async fn set_read_by_all(&self, ids: &[NotificationId], value: bool) -> AppResult<u64> {
        let mut rows = self.rows.write().await;
        let mut updated = 0;
        for id in ids {
            if let Some(n) = rows.get_mut(id) {
                n.is_read_by_all = value;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_pending_review(
        &self,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&id) {
            Some(n)
                if n.lifecycle_status == LifecycleStatus::Active && n.reminder_sent_at.is_none() =>
            {
                n.lifecycle_status = LifecycleStatus::PendingReview;
                n.reminder_sent_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn extend(
        &self,
        id: NotificationId,
        until: DateTime<Utc>,
        entry: serde_json::Value,
    ) -> AppResult<bool> {
        let mut rows = self.rows.write().await;
        let Some(n) = rows.get_mut(&id) else {
            return Ok(false);
        };
        if n.is_archived() {
            return Ok(false);
        }
        n.lifecycle_status = LifecycleStatus::Extended;
        n.extended_until = Some(until);
        n.expires_at = until;
        if !n.metadata.is_object() {
            n.metadata = serde_json::json!({});
        }
        if let Some(obj) = n.metadata.as_object_mut() {
            let history = obj
                .entry("extension_history")
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
            if !history.is_array() {
                *history = serde_json::Value::Array(Vec::new());
            }
            if let Some(items) = history.as_array_mut() {
                items.push(entry);
            }
        }
        Ok(true)
    }

    async fn archive(
        &self,
        ids: &[NotificationId],
        at: DateTime<Utc>,
        reason: &str,
    ) -> AppResult<u64> {
        let mut rows = self.rows.write().await;
        let mut archived = 0;
        for id in ids {
            if let Some(n) = rows.get_mut(id) {
                if matches!(
                    n.lifecycle_status,
                    LifecycleStatus::Active | LifecycleStatus::PendingReview
                ) {
                    n.lifecycle_status = LifecycleStatus::Archived;
                    n.archived_at = Some(at);
                    n.archived_reason = Some(reason.to_string());
                    archived += 1;
                }
            }
        }
        Ok(archived)
    }

    async fn delete(&self, ids: &[NotificationId]) -> AppResult<u64> {
        let mut rows = self.rows.write().await;
        Ok(ids.iter().filter(|id| rows.remove(id).is_some()).count() as u64)
    }

    async fn group_counts(
        &self,
        filter: &NotificationFilter,
        group_by: GroupBy,
    ) -> AppResult<Vec<GroupCount>> {
        let rows = self.rows.read().await;
        let mut groups: HashMap<String, GroupCount> = HashMap::new();
        for n in rows.values().filter(|n| filter.matches(n)) {
            let entry = groups.entry(group_by.key_of(n)).or_insert_with_key(|key| GroupCount {
                key: key.clone(),
                total: 0,
                unread: 0,
                latest_at: n.created_at,
            });
            entry.total += 1;
            if !n.is_read_by_all {
                entry.unread += 1;
            }
            entry.latest_at = entry.latest_at.max(n.created_at);
        }
        let mut out: Vec<GroupCount> = groups.into_values().collect();
        out.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.key.cmp(&b.key)));
        Ok(out)
    }

    async fn daily_counts(&self, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>> {
        let rows = self.rows.read().await;
        let mut days = BTreeMap::new();
        for n in rows.values().filter(|n| n.created_at >= since) {
            *days.entry(n.created_at.date_naive()).or_insert(0u64) += 1;
        }
        Ok(days
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect())
    }

    async fn storage_estimate(&self) -> AppResult<StorageEstimate> {
        let rows = self.rows.read().await;
        Ok(StorageEstimate {
            count: rows.len() as u64,
            approx_bytes: rows.values().map(Notification::approx_size_bytes).sum(),
        })
    }
}
