//! Retention policy handlers.

use axum::Json;
use axum::extract::State;

use movehub_core::config::RetentionPolicy;

use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/admin/notifications/settings
pub async fn get_settings(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<RetentionPolicy>>, ApiError> {
    auth.require_admin()?;
    Ok(Json(ApiResponse::ok(state.settings.current().await)))
}

/// PUT /api/admin/notifications/settings
///
/// Omitted fields take their defaults, not their current values.
pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(policy): Json<RetentionPolicy>,
) -> Result<Json<ApiResponse<RetentionPolicy>>, ApiError> {
    auth.require_admin()?;
    let updated = state.settings.update(&auth, policy).await?;
    Ok(Json(ApiResponse::ok(updated)))
}
