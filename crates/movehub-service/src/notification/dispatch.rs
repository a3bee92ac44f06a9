//! Creates fanned-out notification records.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use movehub_core::error::AppError;
use movehub_database::NotificationStore;
use movehub_entity::notification::{NewNotification, Notification};

/// Turns drafts into stored notifications.
///
/// One call creates exactly one record, however many recipients it has.
#[derive(Clone)]
pub struct NotificationDispatcher {
    store: Arc<dyn NotificationStore>,
    expiry_days: i64,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("expiry_days", &self.expiry_days)
            .finish_non_exhaustive()
    }
}

impl NotificationDispatcher {
    /// Creates a dispatcher; new notifications expire after `expiry_days`.
    pub fn new(store: Arc<dyn NotificationStore>, expiry_days: i64) -> Self {
        Self { store, expiry_days }
    }

    /// Store one notification for the draft's recipients.
    ///
    /// Returns `Ok(None)` without writing when the draft has no recipients,
    /// which happens when e.g. there is no active admin yet.
    pub async fn dispatch(&self, draft: NewNotification) -> Result<Option<Notification>, AppError> {
        if draft.recipient_ids.is_empty() {
            debug!(
                notification_type = %draft.notification_type,
                "Skipping notification without recipients"
            );
            return Ok(None);
        }
        let notification = Notification::create(draft, Utc::now(), self.expiry_days)?;
        self.store.insert(&notification).await?;

        info!(
            notification_id = %notification.id,
            notification_type = %notification.notification_type,
            recipients = notification.recipient_ids.len(),
            "Notification dispatched"
        );
        Ok(Some(notification))
    }
}
