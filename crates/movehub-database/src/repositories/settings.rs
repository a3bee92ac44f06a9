//! PostgreSQL repository for `notification_settings`.

use async_trait::async_trait;
use sqlx::PgPool;

use movehub_core::error::{AppError, ErrorKind};
use movehub_core::result::AppResult;
use movehub_entity::settings::NotificationSetting;

use crate::store::SettingsStore;

/// Repository for persisted notification settings.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    /// Create a new settings repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsStore for SettingsRepository {
    async fn load(&self, key: &str) -> AppResult<Option<NotificationSetting>> {
        sqlx::query_as::<_, NotificationSetting>(
            "SELECT * FROM notification_settings WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to load settings", e))
    }

    async fn save(&self, setting: &NotificationSetting) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO notification_settings (key, value, updated_at, updated_by) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = $3, updated_by = $4",
        )
        .bind(&setting.key)
        .bind(&setting.value)
        .bind(setting.updated_at)
        .bind(setting.updated_by)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to save settings", e))?;
        Ok(())
    }
}
