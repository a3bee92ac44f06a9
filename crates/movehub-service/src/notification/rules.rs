//! Recipient resolution rules: who receives which notifications.

use std::sync::Arc;

use movehub_core::error::AppError;
use movehub_core::types::UserId;
use movehub_database::DirectoryStore;

/// Resolves recipient sets against the user directory.
#[derive(Clone)]
pub struct NotificationRules {
    directory: Arc<dyn DirectoryStore>,
}

impl std::fmt::Debug for NotificationRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationRules").finish_non_exhaustive()
    }
}

impl NotificationRules {
    /// Creates a new rules engine.
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self { directory }
    }

    /// Every active admin.
    pub async fn admins(&self) -> Result<Vec<UserId>, AppError> {
        self.directory.active_admin_ids().await
    }

    /// Every active user.
    pub async fn all_active_users(&self) -> Result<Vec<UserId>, AppError> {
        self.directory.active_user_ids().await
    }

    /// Stakeholders of a document: its creator followed by the active
    /// admins, without duplicates.
    pub async fn stakeholders(&self, created_by: Option<UserId>) -> Result<Vec<UserId>, AppError> {
        let admins = self.admins().await?;
        let mut recipients = Vec::with_capacity(admins.len() + 1);
        if let Some(creator) = created_by {
            recipients.push(creator);
        }
        for admin in admins {
            if !recipients.contains(&admin) {
                recipients.push(admin);
            }
        }
        Ok(recipients)
    }
}
