//! Shared value types: identifiers, pagination, and the notification vocabulary.

pub mod id;
pub mod notification;
pub mod pagination;
pub mod time;

pub use id::{NotificationId, QuotationId, ReceiptId, UserId};
pub use notification::{LifecycleStatus, NotificationPriority, NotificationType};
pub use pagination::{PageRequest, PageResponse};
pub use time::days_before;
