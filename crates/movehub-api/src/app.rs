//! Application builder: wires stores, services, jobs, and the router.

use std::sync::Arc;

use axum::Router;
use axum::middleware as axum_middleware;
use tower_http::trace::TraceLayer;

use movehub_capture::{CaptureBackend, ChangeHandler, EventCaptureAdapter};
use movehub_core::config::AppConfig;
use movehub_core::error::AppError;
use movehub_database::{DirectoryStore, NotificationStore, SettingsStore};
use movehub_service::{
    AdminNotificationService, NotificationDispatcher, NotificationRules, NotificationService,
    RetentionSettings,
};
use movehub_worker::NotificationScheduler;

use crate::middleware::cors::build_cors_layer;
use crate::middleware::logging::request_logging;
use crate::router::build_router;
use crate::state::AppState;

/// Store implementations the application runs against.
#[derive(Clone)]
pub struct Stores {
    /// Notification records.
    pub notifications: Arc<dyn NotificationStore>,
    /// Users and documents.
    pub directory: Arc<dyn DirectoryStore>,
    /// Persisted settings.
    pub settings: Arc<dyn SettingsStore>,
    /// Change event source for the capture adapter.
    pub capture: CaptureBackend,
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

/// Build every service and the scheduler. Nothing is started.
pub async fn build_state(config: AppConfig, stores: Stores) -> Result<AppState, AppError> {
    let notifications = config.notifications.clone();

    // ── Step 1: Retention policy ─────────────────────────────────
    let settings =
        RetentionSettings::load(Arc::clone(&stores.settings), notifications.retention.clone())
            .await?;

    // ── Step 2: Fan-out ──────────────────────────────────────────
    let dispatcher = NotificationDispatcher::new(
        Arc::clone(&stores.notifications),
        notifications.default_expiry_days,
    );
    let rules = NotificationRules::new(Arc::clone(&stores.directory));

    // ── Step 3: Services ─────────────────────────────────────────
    let notification_service =
        Arc::new(NotificationService::new(Arc::clone(&stores.notifications)));
    let admin_service = Arc::new(AdminNotificationService::new(
        Arc::clone(&stores.notifications),
        Arc::clone(&stores.directory),
        dispatcher.clone(),
    ));

    // ── Step 4: Event capture ────────────────────────────────────
    let handler = ChangeHandler::new(
        Arc::clone(&stores.directory),
        rules.clone(),
        dispatcher.clone(),
    );
    let adapter = Arc::new(EventCaptureAdapter::new(
        handler,
        Arc::clone(&stores.directory),
        stores.capture,
        notifications.capture.clone(),
    ));

    // ── Step 5: Scheduler ────────────────────────────────────────
    let scheduler = NotificationScheduler::new(
        Arc::clone(&stores.notifications),
        dispatcher,
        rules,
        settings.clone(),
        notifications,
        config.is_production(),
    )
    .with_capture(adapter);

    Ok(AppState {
        config: Arc::new(config),
        notification_service,
        admin_service,
        settings,
        scheduler: Arc::new(scheduler),
    })
}

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors);
    build_router(state)
        .layer(axum_middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
