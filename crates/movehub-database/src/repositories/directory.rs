//! PostgreSQL repository for the upstream users, quotations, and receipts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use movehub_core::error::{AppError, ErrorKind};
use movehub_core::result::AppResult;
use movehub_core::types::{QuotationId, ReceiptId, UserId};
use movehub_entity::document::{Quotation, Receipt};
use movehub_entity::user::User;

use crate::store::DirectoryStore;

/// Read-only access to the tables the capture adapter watches.
#[derive(Debug, Clone)]
pub struct DirectoryRepository {
    pool: PgPool,
}

impl DirectoryRepository {
    /// Create a new directory repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryStore for DirectoryRepository {
    async fn find_user(&self, id: UserId) -> AppResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user", e))
    }

    async fn find_users(&self, ids: &[UserId]) -> AppResult<Vec<User>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| id.into_uuid()).collect();
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find users", e))
    }

    async fn active_admin_ids(&self) -> AppResult<Vec<UserId>> {
        sqlx::query_scalar::<_, UserId>(
            "SELECT id FROM users WHERE role = 'admin' AND status = 'active' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list active admins", e))
    }

    async fn active_user_ids(&self) -> AppResult<Vec<UserId>> {
        sqlx::query_scalar::<_, UserId>(
            "SELECT id FROM users WHERE status = 'active' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list active users", e))
    }

    async fn find_quotation(&self, id: QuotationId) -> AppResult<Option<Quotation>> {
        sqlx::query_as::<_, Quotation>("SELECT * FROM quotations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find quotation", e))
    }

    async fn find_receipt(&self, id: ReceiptId) -> AppResult<Option<Receipt>> {
        sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find receipt", e))
    }

    async fn expired_quotations(&self, now: DateTime<Utc>) -> AppResult<Vec<Quotation>> {
        sqlx::query_as::<_, Quotation>(
            "SELECT * FROM quotations WHERE status = 'sent' AND valid_until < $1 \
             ORDER BY valid_until",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list expired quotations", e)
        })
    }

    async fn overdue_receipts(&self, now: DateTime<Utc>) -> AppResult<Vec<Receipt>> {
        sqlx::query_as::<_, Receipt>(
            "SELECT * FROM receipts WHERE payment_status <> 'paid' AND due_date < $1 \
             ORDER BY due_date",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list overdue receipts", e)
        })
    }
}
