//! Notification fan-out, recipient queries, and admin management.

pub mod admin;
pub mod dispatch;
pub mod rules;
pub mod service;

pub use admin::AdminNotificationService;
pub use dispatch::NotificationDispatcher;
pub use rules::NotificationRules;
pub use service::NotificationService;
