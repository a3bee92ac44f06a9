//! Route definitions for the MoveHub HTTP API.
//!
//! All routes are mounted under `/api`.

use axum::Router;
use axum::routing::{get, post, put};

use crate::handlers;
use crate::state::AppState;

/// Build the router with every route and the shared state.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(notification_routes())
        .merge(admin_notification_routes())
        .merge(admin_job_routes())
        .merge(health_routes());

    Router::new().nest("/api", api_routes).with_state(state)
}

/// Recipient endpoints
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::notification::list_notifications))
        .route(
            "/notifications/unread-count",
            get(handlers::notification::unread_count),
        )
        .route("/notifications/read-all", put(handlers::notification::mark_all_read))
        .route("/notifications/{id}/read", put(handlers::notification::mark_read))
        .route("/notifications/{id}/unread", put(handlers::notification::mark_unread))
}

/// Admin notification management
fn admin_notification_routes() -> Router<AppState> {
    use handlers::admin::{notifications, settings, system};

    Router::new()
        .route("/admin/notifications", post(notifications::create))
        .route("/admin/notifications/groups", get(notifications::groups))
        .route(
            "/admin/notifications/pending-review",
            get(notifications::pending_review),
        )
        .route(
            "/admin/notifications/bulk-delete",
            post(notifications::bulk_delete),
        )
        .route("/admin/notifications/{id}/extend", post(notifications::extend))
        .route("/admin/notifications/analytics", get(notifications::analytics))
        .route(
            "/admin/notifications/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        .route(
            "/admin/notifications/cleanup/preview",
            get(system::cleanup_preview),
        )
        .route(
            "/admin/notifications/system-health",
            get(system::system_health),
        )
        .route("/admin/capture/trigger", post(system::capture_trigger))
}

/// Admin job control
fn admin_job_routes() -> Router<AppState> {
    use handlers::admin::jobs;

    Router::new()
        .route("/admin/jobs/status", get(jobs::status))
        .route("/admin/jobs/{name}/run", post(jobs::run_job))
        .route("/admin/jobs/{name}/restart", post(jobs::restart_job))
}

/// Liveness
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}
