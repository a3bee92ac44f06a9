//! User entity model.

use chrono::{DateTime, Utc};
use movehub_core::types::UserId;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::role::UserRole;
use super::status::UserStatus;

/// A user account as seen by the notification subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Email address.
    pub email: Option<String>,
    /// Human-readable display name.
    pub display_name: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// User role.
    pub role: UserRole,
    /// Account status.
    pub status: UserStatus,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Check if this user has admin privileges.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Check if the account is active.
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Names of the contact fields that are missing or blank.
    pub fn missing_profile_fields(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or("").is_empty();
        let mut missing = Vec::new();
        if blank(&self.email) {
            missing.push("email");
        }
        if blank(&self.phone) {
            missing.push("phone");
        }
        if blank(&self.display_name) {
            missing.push("display_name");
        }
        missing
    }

    /// Name to show in generated messages.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}
