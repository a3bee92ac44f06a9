//! The live retention policy and its persistence boundary.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use movehub_core::config::RetentionPolicy;
use movehub_core::error::AppError;
use movehub_database::SettingsStore;
use movehub_entity::settings::{NotificationSetting, RETENTION_SETTINGS_KEY};

use crate::context::RequestContext;

/// Holds the current [`RetentionPolicy`].
///
/// Jobs take a snapshot with [`current`](Self::current) at the start of
/// each run. Updates are validated, persisted to the settings store, and
/// then swapped in, so they survive restarts.
#[derive(Clone)]
pub struct RetentionSettings {
    policy: Arc<RwLock<RetentionPolicy>>,
    store: Arc<dyn SettingsStore>,
}

impl std::fmt::Debug for RetentionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionSettings").finish_non_exhaustive()
    }
}

impl RetentionSettings {
    /// Load the persisted policy, falling back to `defaults` when no row
    /// exists or the stored document no longer parses.
    pub async fn load(
        store: Arc<dyn SettingsStore>,
        defaults: RetentionPolicy,
    ) -> Result<Self, AppError> {
        let policy = match store.load(RETENTION_SETTINGS_KEY).await? {
            Some(row) => match serde_json::from_value::<RetentionPolicy>(row.value) {
                Ok(policy) if policy.validate().is_ok() => {
                    info!(updated_at = %row.updated_at, "Loaded persisted retention policy");
                    policy
                }
                Ok(_) | Err(_) => {
                    warn!("Persisted retention policy is invalid, using configured defaults");
                    defaults
                }
            },
            None => defaults,
        };
        Ok(Self {
            policy: Arc::new(RwLock::new(policy)),
            store,
        })
    }

    /// Snapshot of the current policy.
    pub async fn current(&self) -> RetentionPolicy {
        self.policy.read().await.clone()
    }

    /// Replace the policy. Admin only.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        policy: RetentionPolicy,
    ) -> Result<RetentionPolicy, AppError> {
        ctx.require_admin()?;
        policy.validate()?;

        let row = NotificationSetting {
            key: RETENTION_SETTINGS_KEY.to_string(),
            value: serde_json::to_value(&policy)?,
            updated_at: Utc::now(),
            updated_by: Some(ctx.user_id),
        };
        self.store.save(&row).await?;
        *self.policy.write().await = policy.clone();

        info!(
            admin_id = %ctx.user_id,
            enable_auto_cleanup = policy.enable_auto_cleanup,
            auto_delete_read = policy.auto_delete_read_notifications,
            "Retention policy updated"
        );
        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use movehub_core::types::UserId;
    use movehub_database::memory::MemorySettingsStore;
    use movehub_entity::user::UserRole;

    #[tokio::test]
    async fn test_update_persists_across_reload() {
        let store = Arc::new(MemorySettingsStore::new());
        let settings = RetentionSettings::load(store.clone(), RetentionPolicy::default())
            .await
            .unwrap();
        let admin = RequestContext::new(UserId::new(), UserRole::Admin);

        let updated = RetentionPolicy {
            max_archive_size: 42,
            ..RetentionPolicy::default()
        };
        settings.update(&admin, updated).await.unwrap();

        let reloaded = RetentionSettings::load(store, RetentionPolicy::default())
            .await
            .unwrap();
        assert_eq!(reloaded.current().await.max_archive_size, 42);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_and_non_admin() {
        let store = Arc::new(MemorySettingsStore::new());
        let settings = RetentionSettings::load(store, RetentionPolicy::default())
            .await
            .unwrap();

        let staff = RequestContext::new(UserId::new(), UserRole::Staff);
        assert!(settings.update(&staff, RetentionPolicy::default()).await.is_err());

        let admin = RequestContext::new(UserId::new(), UserRole::Admin);
        let bad = RetentionPolicy {
            notification_batch_size: 0,
            ..RetentionPolicy::default()
        };
        assert!(settings.update(&admin, bad).await.is_err());
        assert_eq!(settings.current().await, RetentionPolicy::default());
    }
}
