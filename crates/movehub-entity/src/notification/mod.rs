//! Notification domain entities.

pub mod draft;
pub mod model;
pub mod read_receipt;

pub use draft::NewNotification;
pub use model::Notification;
pub use read_receipt::ReadReceipt;

pub use movehub_core::types::{LifecycleStatus, NotificationPriority, NotificationType};

/// Archive reason recorded by age-based cleanup.
pub const ARCHIVE_REASON_AGE: &str = "auto_cleanup_age_based";
