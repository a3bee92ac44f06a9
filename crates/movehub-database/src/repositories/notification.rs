//! PostgreSQL notification repository.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use movehub_core::error::{AppError, ErrorKind};
use movehub_core::result::AppResult;
use movehub_core::types::{NotificationId, UserId};
use movehub_entity::notification::{Notification, ReadReceipt};

use crate::store::{
    DailyCount, GroupBy, GroupCount, NotificationFilter, NotificationStore, SortDirection,
    StorageEstimate,
};

/// Recomputes the read-by-all flag from the receipts column.
const RECEIPT_IDS: &str =
    "ARRAY(SELECT (r->>'recipient_id')::uuid FROM jsonb_array_elements(read_receipts) r)";

/// Repository for the `notifications` table.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    /// Create a new notification repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Raw `notifications` row; enum columns are stored as text.
#[derive(Debug, FromRow)]
struct NotificationRow {
    id: Uuid,
    notification_type: String,
    title: String,
    message: String,
    priority: String,
    action_url: Option<String>,
    action_text: Option<String>,
    actor_id: Option<Uuid>,
    primary_recipient_id: Uuid,
    recipient_ids: Vec<Uuid>,
    read_receipts: Json<Vec<ReadReceipt>>,
    is_read_by_all: bool,
    notification_group: Option<String>,
    admin_managed: bool,
    lifecycle_status: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    reminder_sent_at: Option<DateTime<Utc>>,
    extended_until: Option<DateTime<Utc>>,
    archived_at: Option<DateTime<Utc>>,
    archived_reason: Option<String>,
    metadata: serde_json::Value,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: NotificationId::from_uuid(row.id),
            notification_type: row.notification_type.parse()?,
            title: row.title,
            message: row.message,
            priority: row.priority.parse()?,
            action_url: row.action_url,
            action_text: row.action_text,
            actor_id: row.actor_id.map(UserId::from_uuid),
            primary_recipient_id: UserId::from_uuid(row.primary_recipient_id),
            recipient_ids: row.recipient_ids.into_iter().map(UserId::from_uuid).collect(),
            read_receipts: row.read_receipts.0,
            is_read_by_all: row.is_read_by_all,
            notification_group: row.notification_group,
            admin_managed: row.admin_managed,
            lifecycle_status: row.lifecycle_status.parse()?,
            created_at: row.created_at,
            expires_at: row.expires_at,
            reminder_sent_at: row.reminder_sent_at,
            extended_until: row.extended_until,
            archived_at: row.archived_at,
            archived_reason: row.archived_reason,
            metadata: row.metadata,
        })
    }
}

fn uuids(ids: &[NotificationId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.into_uuid()).collect()
}

fn db_err(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::with_source(ErrorKind::Database, context, e)
}

/// Append the filter's predicates to a query that already ends in a
/// `WHERE` clause.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &NotificationFilter) {
    if let Some(ids) = &f.ids {
        qb.push(" AND id = ANY(").push_bind(uuids(ids)).push(")");
    }
    if let Some(statuses) = &f.statuses {
        let values: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
        qb.push(" AND lifecycle_status = ANY(").push_bind(values).push(")");
    }
    if let Some(types) = &f.types {
        let values: Vec<String> = types.iter().map(|t| t.to_string()).collect();
        qb.push(" AND notification_type = ANY(").push_bind(values).push(")");
    }
    if !f.exclude_types.is_empty() {
        let values: Vec<String> = f.exclude_types.iter().map(|t| t.to_string()).collect();
        qb.push(" AND NOT (notification_type = ANY(").push_bind(values).push("))");
    }
    if let Some(priority) = f.priority {
        qb.push(" AND priority = ").push_bind(priority.to_string());
    }
    if let Some(managed) = f.admin_managed {
        qb.push(" AND admin_managed = ").push_bind(managed);
    }
    if let Some(before) = f.created_before {
        qb.push(" AND created_at < ").push_bind(before);
    }
    if let Some(after) = f.created_after {
        qb.push(" AND created_at >= ").push_bind(after);
    }
    if let Some(user) = f.recipient {
        qb.push(" AND ")
            .push_bind(user.into_uuid())
            .push(" = ANY(recipient_ids)");
        if let Some(has_read) = f.recipient_has_read {
            qb.push(if has_read { " AND EXISTS" } else { " AND NOT EXISTS" })
                .push(
                    " (SELECT 1 FROM jsonb_array_elements(read_receipts) r \
                     WHERE (r->>'recipient_id')::uuid = ",
                )
                .push_bind(user.into_uuid())
                .push(")");
        }
    }
    if let Some(read) = f.is_read_by_all {
        qb.push(" AND is_read_by_all = ").push_bind(read);
    }
    if let Some(at) = f.not_expired_at {
        qb.push(" AND expires_at > ").push_bind(at);
    }
    if let Some(sent) = f.reminder_sent {
        qb.push(if sent {
            " AND reminder_sent_at IS NOT NULL"
        } else {
            " AND reminder_sent_at IS NULL"
        });
    }
    if let Some(extended) = f.extended {
        qb.push(if extended {
            " AND extended_until IS NOT NULL"
        } else {
            " AND extended_until IS NULL"
        });
    }
    if let Some(now) = f.needs_review_at {
        qb.push(
            " AND (lifecycle_status = 'pending_review' \
             OR (lifecycle_status = 'extended' AND extended_until <= ",
        )
        .push_bind(now)
        .push("))");
    }
    if f.read_flag_mismatch {
        qb.push(" AND cardinality(recipient_ids) > 0 AND is_read_by_all <> (recipient_ids <@ ")
            .push(RECEIPT_IDS)
            .push(")");
    }
}

#[derive(Debug, FromRow)]
struct GroupRow {
    key: String,
    total: i64,
    unread: i64,
    latest_at: DateTime<Utc>,
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn insert(&self, n: &Notification) -> AppResult<()> {
        let recipients: Vec<Uuid> = n.recipient_ids.iter().map(|r| r.into_uuid()).collect();
        sqlx::query(
            "INSERT INTO notifications (id, notification_type, title, message, priority, \
             action_url, action_text, actor_id, primary_recipient_id, recipient_ids, \
             read_receipts, is_read_by_all, notification_group, admin_managed, \
             lifecycle_status, created_at, expires_at, reminder_sent_at, extended_until, \
             archived_at, archived_reason, metadata) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
             $16, $17, $18, $19, $20, $21, $22)",
        )
        .bind(n.id)
        .bind(n.notification_type.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.priority.as_str())
        .bind(&n.action_url)
        .bind(&n.action_text)
        .bind(n.actor_id)
        .bind(n.primary_recipient_id)
        .bind(recipients)
        .bind(Json(&n.read_receipts))
        .bind(n.is_read_by_all)
        .bind(&n.notification_group)
        .bind(n.admin_managed)
        .bind(n.lifecycle_status.as_str())
        .bind(n.created_at)
        .bind(n.expires_at)
        .bind(n.reminder_sent_at)
        .bind(n.extended_until)
        .bind(n.archived_at)
        .bind(&n.archived_reason)
        .bind(&n.metadata)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to insert notification"))?;
        Ok(())
    }

    async fn get(&self, id: NotificationId) -> AppResult<Option<Notification>> {
        sqlx::query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to get notification"))?
            .map(Notification::try_from)
            .transpose()
    }

    async fn find(
        &self,
        filter: &NotificationFilter,
        sort: SortDirection,
        limit: Option<u64>,
        offset: u64,
    ) -> AppResult<Vec<Notification>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM notifications WHERE TRUE");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at ")
            .push(sort.as_sql())
            .push(", id ")
            .push(sort.as_sql());
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        if offset > 0 {
            qb.push(" OFFSET ").push_bind(offset as i64);
        }

        qb.build_query_as::<NotificationRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to query notifications"))?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    async fn count(&self, filter: &NotificationFilter) -> AppResult<u64> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM notifications WHERE TRUE");
        push_filter(&mut qb, filter);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count notifications"))?;
        Ok(count as u64)
    }

    async fn add_read_receipt(
        &self,
        id: NotificationId,
        user: UserId,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let receipt = Json(vec![ReadReceipt::new(user, at)]);
        let sql = format!(
            "UPDATE notifications SET \
             read_receipts = read_receipts || $3::jsonb, \
             is_read_by_all = recipient_ids <@ ({RECEIPT_IDS} || $2::uuid) \
             WHERE id = $1 AND $2 = ANY(recipient_ids) \
             AND NOT EXISTS (SELECT 1 FROM jsonb_array_elements(read_receipts) r \
             WHERE (r->>'recipient_id')::uuid = $2)"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(user)
            .bind(receipt)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to add read receipt"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_read_receipt(&self, id: NotificationId, user: UserId) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET \
             read_receipts = COALESCE((SELECT jsonb_agg(r) FROM jsonb_array_elements(read_receipts) r \
             WHERE (r->>'recipient_id')::uuid <> $2), '[]'::jsonb), \
             is_read_by_all = FALSE \
             WHERE id = $1 AND EXISTS (SELECT 1 FROM jsonb_array_elements(read_receipts) r \
             WHERE (r->>'recipient_id')::uuid = $2)",
        )
        .bind(id)
        .bind(user)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to remove read receipt"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_read_by_all(&self, ids: &[NotificationId], value: bool) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result =
            sqlx::query("UPDATE notifications SET is_read_by_all = $2 WHERE id = ANY($1)")
                .bind(uuids(ids))
                .bind(value)
                .execute(&self.pool)
                .await
                .map_err(db_err("Failed to update read flags"))?;
        Ok(result.rows_affected())
    }

    async fn mark_pending_review(
        &self,
        id: NotificationId,
        at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET lifecycle_status = 'pending_review', reminder_sent_at = $2 \
             WHERE id = $1 AND lifecycle_status = 'active' AND reminder_sent_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to move notification to review"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn extend(
        &self,
        id: NotificationId,
        until: DateTime<Utc>,
        entry: serde_json::Value,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET lifecycle_status = 'extended', \
             extended_until = $2, expires_at = $2, \
             metadata = jsonb_set( \
               CASE WHEN jsonb_typeof(metadata) = 'object' THEN metadata ELSE '{}'::jsonb END, \
               '{extension_history}', \
               COALESCE(CASE WHEN jsonb_typeof(metadata->'extension_history') = 'array' \
                 THEN metadata->'extension_history' END, '[]'::jsonb) || jsonb_build_array($3::jsonb)) \
             WHERE id = $1 AND lifecycle_status <> 'archived'",
        )
        .bind(id)
        .bind(until)
        .bind(entry)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to extend notification"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn archive(
        &self,
        ids: &[NotificationId],
        at: DateTime<Utc>,
        reason: &str,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            "UPDATE notifications SET lifecycle_status = 'archived', archived_at = $2, \
             archived_reason = $3 \
             WHERE id = ANY($1) AND lifecycle_status IN ('active', 'pending_review')",
        )
        .bind(uuids(ids))
        .bind(at)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to archive notifications"))?;
        Ok(result.rows_affected())
    }

    async fn delete(&self, ids: &[NotificationId]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM notifications WHERE id = ANY($1)")
            .bind(uuids(ids))
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to delete notifications"))?;
        Ok(result.rows_affected())
    }

    async fn group_counts(
        &self,
        filter: &NotificationFilter,
        group_by: GroupBy,
    ) -> AppResult<Vec<GroupCount>> {
        let key = match group_by {
            GroupBy::Group => "COALESCE(notification_group, 'ungrouped')",
            GroupBy::Type => "notification_type",
            GroupBy::Status => "lifecycle_status",
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        qb.push(key).push(
            " AS key, COUNT(*) AS total, \
             COUNT(*) FILTER (WHERE NOT is_read_by_all) AS unread, \
             MAX(created_at) AS latest_at FROM notifications WHERE TRUE",
        );
        push_filter(&mut qb, filter);
        qb.push(" GROUP BY 1 ORDER BY total DESC, key ASC");

        let rows = qb
            .build_query_as::<GroupRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to group notifications"))?;
        Ok(rows
            .into_iter()
            .map(|r| GroupCount {
                key: r.key,
                total: r.total as u64,
                unread: r.unread as u64,
                latest_at: r.latest_at,
            })
            .collect())
    }

    async fn daily_counts(&self, since: DateTime<Utc>) -> AppResult<Vec<DailyCount>> {
        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) \
             FROM notifications WHERE created_at >= $1 GROUP BY 1 ORDER BY 1",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("Failed to count notifications per day"))?;
        Ok(rows
            .into_iter()
            .map(|(date, count)| DailyCount {
                date,
                count: count as u64,
            })
            .collect())
    }

    async fn storage_estimate(&self) -> AppResult<StorageEstimate> {
        let (count, bytes): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(pg_column_size(n.*)), 0)::BIGINT FROM notifications n",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err("Failed to estimate notification storage"))?;
        Ok(StorageEstimate {
            count: count as u64,
            approx_bytes: bytes as u64,
        })
    }
}
