//! Per-recipient read receipt.

use chrono::{DateTime, Utc};
use movehub_core::types::UserId;
use serde::{Deserialize, Serialize};

/// Records that one recipient has read a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadReceipt {
    /// The recipient who read it.
    pub recipient_id: UserId,
    /// When it was read.
    pub read_at: DateTime<Utc>,
}

impl ReadReceipt {
    /// Create a receipt.
    pub fn new(recipient_id: UserId, read_at: DateTime<Utc>) -> Self {
        Self {
            recipient_id,
            read_at,
        }
    }
}
