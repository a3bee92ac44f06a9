//! In-memory settings store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use movehub_core::result::AppResult;
use movehub_entity::settings::NotificationSetting;

use crate::store::SettingsStore;

/// Settings rows held in a process-local map.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    rows: Arc<RwLock<HashMap<String, NotificationSetting>>>,
}

impl MemorySettingsStore {
    /// Create an empty settings store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self, key: &str) -> AppResult<Option<NotificationSetting>> {
        Ok(self.rows.read().await.get(key).cloned())
    }

    async fn save(&self, setting: &NotificationSetting) -> AppResult<()> {
        self.rows
            .write()
            .await
            .insert(setting.key.clone(), setting.clone());
        Ok(())
    }
}
