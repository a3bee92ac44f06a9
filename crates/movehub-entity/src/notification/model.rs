//! Notification entity model.

use chrono::{DateTime, Duration, Utc};
use movehub_core::AppError;
use movehub_core::types::{
    LifecycleStatus, NotificationId, NotificationPriority, NotificationType, UserId,
};
use serde::{Deserialize, Serialize};

use super::draft::NewNotification;
use super::read_receipt::ReadReceipt;

/// One logical notification fanned out to several recipients.
///
/// Recipients are unique and non-empty; read receipts hold at most one entry
/// per recipient and only for recipients. `is_read_by_all` is a cached view
/// of the receipts and may lag until reconciliation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: NotificationId,
    /// Domain event kind.
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    /// Title shown to recipients.
    pub title: String,
    /// Body text shown to recipients.
    pub message: String,
    /// Presentation priority.
    pub priority: NotificationPriority,
    /// Link for the call-to-action.
    pub action_url: Option<String>,
    /// Label for the call-to-action.
    pub action_text: Option<String>,
    /// Originator, `None` for system-generated notifications.
    pub actor_id: Option<UserId>,
    /// First recipient, kept for single-recipient consumers.
    pub primary_recipient_id: UserId,
    /// Every recipient.
    pub recipient_ids: Vec<UserId>,
    /// Per-recipient read state.
    pub read_receipts: Vec<ReadReceipt>,
    /// Cached "every recipient has read it" flag.
    pub is_read_by_all: bool,
    /// Correlation key for admin aggregation.
    pub notification_group: Option<String>,
    /// Whether the lifecycle jobs manage this notification.
    pub admin_managed: bool,
    /// Retention stage.
    pub lifecycle_status: LifecycleStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time; expired notifications stop counting as unread.
    pub expires_at: DateTime<Utc>,
    /// When the admin review reminder went out.
    pub reminder_sent_at: Option<DateTime<Utc>>,
    /// End of the current extension.
    pub extended_until: Option<DateTime<Utc>>,
    /// When the notification was archived.
    pub archived_at: Option<DateTime<Utc>>,
    /// Why the notification was archived.
    pub archived_reason: Option<String>,
    /// Opaque structured payload.
    pub metadata: serde_json::Value,
}

impl Notification {
    /// Build a notification from a draft.
    ///
    /// Duplicate recipients are collapsed keeping first occurrence order.
    /// Returns a validation error when no recipient remains.
    pub fn create(
        draft: NewNotification,
        now: DateTime<Utc>,
        expiry_days: i64,
    ) -> Result<Self, AppError> {
        let mut recipient_ids: Vec<UserId> = Vec::with_capacity(draft.recipient_ids.len());
        for id in draft.recipient_ids {
            if !recipient_ids.contains(&id) {
                recipient_ids.push(id);
            }
        }
        let primary_recipient_id = *recipient_ids
            .first()
            .ok_or_else(|| AppError::validation("A notification needs at least one recipient"))?;

        let notification_group = draft.notification_group.or_else(|| {
            Some(format!(
                "{}_{}",
                draft.notification_type,
                now.format("%Y-%m-%d")
            ))
        });

        Ok(Self {
            id: NotificationId::new(),
            notification_type: draft.notification_type,
            title: draft.title,
            message: draft.message,
            priority: draft
                .priority
                .unwrap_or_else(|| draft.notification_type.default_priority()),
            action_url: draft.action_url,
            action_text: draft.action_text,
            actor_id: draft.actor_id,
            primary_recipient_id,
            recipient_ids,
            read_receipts: Vec::new(),
            is_read_by_all: false,
            notification_group,
            admin_managed: draft.admin_managed,
            lifecycle_status: LifecycleStatus::Active,
            created_at: now,
            expires_at: now + Duration::days(expiry_days),
            reminder_sent_at: None,
            extended_until: None,
            archived_at: None,
            archived_reason: None,
            metadata: draft.metadata,
        })
    }

    /// Whether `user` is one of the recipients.
    pub fn is_recipient(&self, user: UserId) -> bool {
        self.recipient_ids.contains(&user)
    }

    /// Whether `user` has a read receipt.
    pub fn has_read(&self, user: UserId) -> bool {
        self.read_receipts.iter().any(|r| r.recipient_id == user)
    }

    /// The read-by-all value derived from the receipts.
    pub fn computed_read_by_all(&self) -> bool {
        !self.recipient_ids.is_empty() && self.recipient_ids.iter().all(|id| self.has_read(*id))
    }

    /// Whether the cached flag disagrees with the receipts.
    pub fn read_flag_drifted(&self) -> bool {
        self.is_read_by_all != self.computed_read_by_all()
    }

    /// Add a receipt for `user`. Returns `false` when nothing changed.
    ///
    /// Non-recipients are ignored so receipts stay a subset of recipients.
    pub fn mark_read(&mut self, user: UserId, at: DateTime<Utc>) -> bool {
        if !self.is_recipient(user) || self.has_read(user) {
            return false;
        }
        self.read_receipts.push(ReadReceipt::new(user, at));
        self.is_read_by_all = self.computed_read_by_all();
        true
    }

    /// Remove the receipt for `user`. Returns `false` when nothing changed.
    pub fn mark_unread(&mut self, user: UserId) -> bool {
        let before = self.read_receipts.len();
        self.read_receipts.retain(|r| r.recipient_id != user);
        if self.read_receipts.len() == before {
            return false;
        }
        self.is_read_by_all = self.computed_read_by_all();
        true
    }

    /// Whether the notification has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whether the notification is archived.
    pub fn is_archived(&self) -> bool {
        self.lifecycle_status == LifecycleStatus::Archived
    }

    /// Whether an extension has run out at `now`.
    pub fn extension_lapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.lifecycle_status == LifecycleStatus::Extended
            && self.extended_until.is_some_and(|until| until <= now)
    }

    /// Age in whole days at `now`.
    pub fn age_days_at(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }

    /// Rough serialized size, used for storage estimates.
    pub fn approx_size_bytes(&self) -> u64 {
        serde_json::to_vec(self).map(|v| v.len() as u64).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(recipients: Vec<UserId>) -> NewNotification {
        NewNotification::new(
            NotificationType::DocumentCreated,
            "Quotation Q-1 created",
            "A new quotation was created",
            recipients,
        )
    }

    #[test]
    fn test_create_deduplicates_recipients() {
        let a = UserId::new();
        let b = UserId::new();
        let n = Notification::create(draft(vec![a, b, a]), Utc::now(), 30).unwrap();
        assert_eq!(n.recipient_ids, vec![a, b]);
        assert_eq!(n.primary_recipient_id, a);
        assert_eq!(n.lifecycle_status, LifecycleStatus::Active);
        assert!(n.notification_group.as_deref().unwrap().starts_with("document_created_"));
    }

    #[test]
    fn test_create_rejects_empty_recipients() {
        let err = Notification::create(draft(vec![]), Utc::now(), 30).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_read_state_follows_receipts() {
        let a = UserId::new();
        let b = UserId::new();
        let mut n = Notification::create(draft(vec![a, b]), Utc::now(), 30).unwrap();

        assert!(n.mark_read(a, Utc::now()));
        assert!(!n.mark_read(a, Utc::now()));
        assert!(!n.is_read_by_all);

        assert!(n.mark_read(b, Utc::now()));
        assert!(n.is_read_by_all);

        assert!(n.mark_unread(b));
        assert!(!n.mark_unread(b));
        assert!(!n.is_read_by_all);
    }

    #[test]
    fn test_non_recipient_cannot_add_receipt() {
        let a = UserId::new();
        let mut n = Notification::create(draft(vec![a]), Utc::now(), 30).unwrap();
        assert!(!n.mark_read(UserId::new(), Utc::now()));
        assert!(n.read_receipts.is_empty());
    }

    #[test]
    fn test_drift_detection() {
        let a = UserId::new();
        let mut n = Notification::create(draft(vec![a]), Utc::now(), 30).unwrap();
        n.read_receipts.push(ReadReceipt::new(a, Utc::now()));
        assert!(n.read_flag_drifted());
    }
}
