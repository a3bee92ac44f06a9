//! In-memory upstream entity directory.
//!
//! Writes through the `put_*`/`remove_*` helpers publish [`ChangeEvent`]s on
//! a broadcast channel, which the capture crate consumes as a live change
//! feed in single-node runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

use movehub_core::events::{ChangeEvent, EntityKind};
use movehub_core::result::AppResult;
use movehub_core::types::{QuotationId, ReceiptId, UserId};
use movehub_entity::document::{Quotation, QuotationStatus, Receipt};
use movehub_entity::user::{User, UserRole};

use crate::store::DirectoryStore;

/// Broadcast buffer for change events.
const CHANGE_BUFFER: usize = 1024;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    quotations: HashMap<QuotationId, Quotation>,
    receipts: HashMap<ReceiptId, Receipt>,
}

/// Users, quotations, and receipts held in process-local maps.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    tables: Arc<RwLock<Tables>>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl Default for MemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            changes,
        }
    }

    /// Subscribe to change events published by subsequent writes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    /// Insert or replace a user.
    pub async fn put_user(&self, user: User) -> AppResult<()> {
        let id = user.id.into_uuid();
        let before = self.tables.write().await.users.insert(user.id, user.clone());
        self.publish(EntityKind::User, id, before.as_ref(), &user)
    }

    /// Remove a user.
    pub async fn remove_user(&self, id: UserId) -> bool {
        let removed = self.tables.write().await.users.remove(&id).is_some();
        if removed {
            self.send(ChangeEvent::delete(EntityKind::User, id.into_uuid()));
        }
        removed
    }

    /// Insert or replace a quotation.
    pub async fn put_quotation(&self, quotation: Quotation) -> AppResult<()> {
        let id = quotation.id.into_uuid();
        let before = self
            .tables
            .write()
            .await
            .quotations
            .insert(quotation.id, quotation.clone());
        self.publish(EntityKind::Quotation, id, before.as_ref(), &quotation)
    }

    /// Remove a quotation.
    pub async fn remove_quotation(&self, id: QuotationId) -> bool {
        let removed = self.tables.write().await.quotations.remove(&id).is_some();
        if removed {
            self.send(ChangeEvent::delete(EntityKind::Quotation, id.into_uuid()));
        }
        removed
    }

    /// Insert or replace a receipt.
    pub async fn put_receipt(&self, receipt: Receipt) -> AppResult<()> {
        let id = receipt.id.into_uuid();
        let before = self
            .tables
            .write()
            .await
            .receipts
            .insert(receipt.id, receipt.clone());
        self.publish(EntityKind::Receipt, id, before.as_ref(), &receipt)
    }

    /// Remove a receipt.
    pub async fn remove_receipt(&self, id: ReceiptId) -> bool {
        let removed = self.tables.write().await.receipts.remove(&id).is_some();
        if removed {
            self.send(ChangeEvent::delete(EntityKind::Receipt, id.into_uuid()));
        }
        removed
    }

    fn publish<T: Serialize>(
        &self,
        entity: EntityKind,
        id: uuid::Uuid,
        before: Option<&T>,
        after: &T,
    ) -> AppResult<()> {
        let after = serde_json::to_value(after)?;
        let event = match before {
            Some(prev) => ChangeEvent::update(entity, id, serde_json::to_value(prev)?, after),
            None => ChangeEvent::insert(entity, id, after),
        };
        self.send(event);
        Ok(())
    }

    fn send(&self, event: ChangeEvent) {
        // No subscribers is normal before the capture adapter starts.
        if self.changes.send(event).is_err() {
            debug!("Change event dropped: no subscribers");
        }
    }
}

#[async_trait]
impl DirectoryStore for MemoryDirectory {
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn active_admin_ids(&self) -> AppResult<Vec<UserId>> {
        let tables = self.tables.read().await;
        let mut admins: Vec<&User> = tables
            .users
            .values()
            .filter(|u| u.role == UserRole::Admin && u.is_active())
            .collect();
        admins.sort_by_key(|u| u.created_at);
        Ok(admins.into_iter().map(|u| u.id).collect())
    }

    async fn active_user_ids(&self) -> AppResult<Vec<UserId>> {
        let tables = self.tables.read().await;
        let mut users: Vec<&User> = tables.users.values().filter(|u| u.is_active()).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users.into_iter().map(|u| u.id).collect())
    }

    async fn find_quotation(&self, id: QuotationId) -> AppResult<Option<Quotation>> {
        Ok(self.tables.read().await.quotations.get(&id).cloned())
    }

    async fn find_receipt(&self, id: ReceiptId) -> AppResult<Option<Receipt>> {
        Ok(self.tables.read().await.receipts.get(&id).cloned())
    }

    async fn expired_quotations(&self, now: DateTime<Utc>) -> AppResult<Vec<Quotation>> {
        let tables = self.tables.read().await;
        Ok(tables
            .quotations
            .values()
            .filter(|q| q.status == QuotationStatus::Sent && q.is_expired_at(now))
            .cloned()
            .collect())
    }

    async fn overdue_receipts(&self, now: DateTime<Utc>) -> AppResult<Vec<Receipt>> {
        let tables = self.tables.read().await;
        Ok(tables
            .receipts
            .values()
            .filter(|r| r.is_overdue_at(now))
            .cloned()
            .collect())
    }
}
