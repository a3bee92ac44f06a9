//! # movehub-service
//!
//! Business logic for the notification subsystem. Services follow
//! constructor injection: every store is handed in as an `Arc<dyn ...>`
//! so the same code runs against PostgreSQL and the in-memory stores.

pub mod context;
pub mod notification;
pub mod retention;

pub use context::RequestContext;
pub use notification::{
    AdminNotificationService, NotificationDispatcher, NotificationRules, NotificationService,
};
pub use retention::RetentionSettings;
