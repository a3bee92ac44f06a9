//! Request context carrying the caller identity supplied by the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use movehub_core::error::AppError;
use movehub_core::types::UserId;
use movehub_entity::user::UserRole;

/// Context for the current authenticated request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    /// The caller's user ID.
    pub user_id: UserId,
    /// The caller's role.
    pub role: UserRole,
    /// When the request was received.
    pub request_time: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a new request context.
    pub fn new(user_id: UserId, role: UserRole) -> Self {
        Self {
            user_id,
            role,
            request_time: Utc::now(),
        }
    }

    /// Returns whether the caller is an admin.
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Fail with `Forbidden` unless the caller is an admin.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden("Admin access required"))
        }
    }
}
