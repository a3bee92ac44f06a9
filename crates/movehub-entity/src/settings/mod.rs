//! Persisted notification settings.

use chrono::{DateTime, Utc};
use movehub_core::types::UserId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Settings key under which the retention policy is stored.
pub const RETENTION_SETTINGS_KEY: &str = "retention";

/// One row of the `notification_settings` table.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NotificationSetting {
    /// Settings key.
    pub key: String,
    /// Settings document.
    pub value: serde_json::Value,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Admin who made the last update.
    pub updated_by: Option<UserId>,
}
