//! Fixtures shared by the job tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use movehub_core::config::RetentionPolicy;
use movehub_core::error::AppError;
use movehub_core::result::AppResult;
use movehub_core::types::{NotificationId, NotificationType, UserId};
use movehub_database::memory::{MemoryDirectory, MemoryNotificationStore, MemorySettingsStore};
use movehub_database::store::{DailyCount, GroupBy, GroupCount, StorageEstimate};
use movehub_database::{NotificationFilter, NotificationStore, SortDirection};
use movehub_entity::notification::{NewNotification, Notification};
use movehub_entity::user::{User, UserRole, UserStatus};
use movehub_service::{NotificationDispatcher, NotificationRules, RetentionSettings};

pub(crate) struct Env {
    pub store: Arc<MemoryNotificationStore>,
    pub directory: Arc<MemoryDirectory>,
    pub dispatcher: NotificationDispatcher,
    pub rules: NotificationRules,
    pub settings: RetentionSettings,
    pub admin: UserId,
}

pub(crate) async fn env(policy: RetentionPolicy) -> Env {
    let store = Arc::new(MemoryNotificationStore::new());
    let directory = Arc::new(MemoryDirectory::new());
    let admin = User {
        id: UserId::new(),
        username: "ops-admin".into(),
        email: Some("ops@example.com".into()),
        display_name: Some("Ops".into()),
        phone: Some("0100".into()),
        role: UserRole::Admin,
        status: UserStatus::Active,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    directory.put_user(admin.clone()).await.unwrap();
    let settings = RetentionSettings::load(Arc::new(MemorySettingsStore::new()), policy)
        .await
        .unwrap();
    Env {
        dispatcher: NotificationDispatcher::new(store.clone(), 30),
        rules: NotificationRules::new(directory.clone()),
        store,
        directory,
        settings,
        admin: admin.id,
    }
}

/// A stored notification created `age_days` ago.
pub(crate) async fn seed(
    store: &MemoryNotificationStore,
    notification_type: NotificationType,
    age_days: i64,
    recipients: Vec<UserId>,
) -> Notification {
    let created_at: DateTime<Utc> = Utc::now() - Duration::days(age_days);
    let n = Notification::create(
        NewNotification::new(notification_type, "seeded", "seeded", recipients),
        created_at,
        30,
    )
    .unwrap();
    store.put(n.clone()).await;
    n
}

pub(crate) async fn of_type(
    store: &MemoryNotificationStore,
    notification_type: NotificationType,
) -> Vec<Notification> {
    store
        .all()
        .await
        .into_iter()
        .filter(|n| n.notification_type == notification_type)
        .collect()
}

/// Memory store with switchable write failures.
pub(crate) struct FlakyStore {
    inner: Arc<MemoryNotificationStore>,
    fail_inserts: AtomicBool,
    fail_read_flag: Option<bool>,
    /// Ids passed to `set_read_by_all`, in call order.
    pub read_flag_attempts: Mutex<Vec<NotificationId>>,
}

impl FlakyStore {
    pub(crate) fn new(inner: Arc<MemoryNotificationStore>) -> Self {
        Self {
            inner,
            fail_inserts: AtomicBool::new(false),
            fail_read_flag: None,
            read_flag_attempts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Fail every `set_read_by_all` call that writes `value`.
    pub(crate) fn failing_read_flag(mut self, value: bool) -> Self {
        self.fail_read_flag = Some(value);
        self
    }
}

#[async_trait]
impl NotificationStore for FlakyStore {
    async fn insert(&self, notification: &Notification) -> AppResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::database("insert rejected"));
        }
        self.inner.insert(notification).await
    }

    async fn get(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        self.inner.get(id).await
    }

    async fn find(
        &self,
        filter: &NotificationFilter,
        sort: SortDirection,
        limit: Option<u64>,
        offset: u64,
    ) -> AppResult<Vec<Notification>> {
        self.inner.find(filter, sort, limit, offset).await
    }

    async fn count(&self, filter: &NotificationFilter) -> AppResult<u64> {
        self.inner.count(filter).await
    }

    async fn add_read_receipt(
        &self,
        id: NotificationId,
        user: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        self.inner.add_read_receipt(id, user, at).await
    }

    async fn remove_read_receipt(&self, id: NotificationId, user: UserId) -> AppResult<bool> {
        self.inner.remove_read_receipt(id, user).await
    }

    async fn set_read_by_all(&self, ids: &[NotificationId], value: bool) -> AppResult<u64> {
        self.read_flag_attempts.lock().unwrap().extend_from_slice(ids);
        if self.fail_read_flag == Some(value) {
            return Err(AppError::database("read flag update rejected"));
        }
        self.inner.set_read_by_all(ids, value).await
    }

    async fn mark_pending_review(&self, id: NotificationId, at: DateTime<Utc>) -> AppResult<bool> {
        self.inner.mark_pending_review(id, at).await
    }

    async fn extend(
        &self,
        id: NotificationId,
        until: DateTime<Utc>,
        entry: serde_json::Value,
    ) -> AppResult<bool> {
        self.inner.extend(id, until, entry).await
    }

    async fn archive(
        &self,
        ids: &[NotificationId],
        at: DateTime<Utc>,
        reason: &str,
    ) -> AppResult<u64> {
        self.inner.archive(ids, at, reason).await
    }

    async fn delete(&self, ids: &[NotificationId]) -> AppResult<u64> {
        self.inner.delete(ids).await
    }

    async fn group_counts(
        &self,
        filter: &NotificationFilter,
        group_by: GroupBy,
    ) -> AppResult<Vec<GroupCount>> {
        self.inner.group_counts(filter, group_by).await
    }

    async fn daily_counts(&self, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>> {
        self.inner.daily_counts(since).await
    }

    async fn storage_estimate(&self) -> AppResult<StorageEstimate> {
        self.inner.storage_estimate().await
    }
}
