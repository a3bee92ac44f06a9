//! Cleanup preview, system health, and capture trigger handlers.

use axum::Json;
use axum::extract::State;

use movehub_core::error::AppError;
use movehub_worker::health::SystemHealth;
use movehub_worker::jobs::CleanupPreview;

use crate::dto::request::CaptureTriggerBody;
use crate::dto::response::{ApiResponse, TriggerResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/admin/notifications/cleanup/preview
pub async fn cleanup_preview(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<CleanupPreview>>, ApiError> {
    auth.require_admin()?;
    let preview = state.scheduler.cleanup_preview().await?;
    Ok(Json(ApiResponse::ok(preview)))
}

/// GET /api/admin/notifications/system-health
pub async fn system_health(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<SystemHealth>>, ApiError> {
    auth.require_admin()?;
    let health = state.scheduler.system_health().await?;
    Ok(Json(ApiResponse::ok(health)))
}

/// POST /api/admin/capture/trigger
pub async fn capture_trigger(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CaptureTriggerBody>,
) -> Result<Json<ApiResponse<TriggerResponse>>, ApiError> {
    auth.require_admin()?;
    let adapter = state
        .scheduler
        .capture()
        .ok_or_else(|| AppError::service_unavailable("Event capture is not configured"))?;
    let notifications_created = adapter.trigger(body.entity, body.id).await?;
    Ok(Json(ApiResponse::ok(TriggerResponse {
        notifications_created,
    })))
}
