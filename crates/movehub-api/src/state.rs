//! Application state shared across all handlers.

use std::sync::Arc;

use movehub_core::config::AppConfig;
use movehub_service::{AdminNotificationService, NotificationService, RetentionSettings};
use movehub_worker::NotificationScheduler;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Recipient notification service
    pub notification_service: Arc<NotificationService>,
    /// Admin notification service
    pub admin_service: Arc<AdminNotificationService>,
    /// Live retention policy
    pub settings: RetentionSettings,
    /// Job scheduler and event capture adapter
    pub scheduler: Arc<NotificationScheduler>,
}
