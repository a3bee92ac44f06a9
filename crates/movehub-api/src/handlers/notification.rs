//! Recipient notification handlers.

use axum::Json;
use axum::extract::{Path, Query, State};

use movehub_core::types::{NotificationId, PageResponse};
use movehub_service::notification::service::{ReadStateChange, RecipientNotification};

use crate::dto::request::ListNotificationsQuery;
use crate::dto::response::{ApiResponse, CountResponse, MarkedResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<ApiResponse<PageResponse<RecipientNotification>>>, ApiError> {
    let (filter, page) = query.into_parts();
    let result = state
        .notification_service
        .list_notifications(&auth, &filter, page)
        .await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<CountResponse>>, ApiError> {
    let count = state.notification_service.unread_count(&auth).await?;
    Ok(Json(ApiResponse::ok(CountResponse { count })))
}

/// PUT /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<Json<ApiResponse<ReadStateChange>>, ApiError> {
    let change = state.notification_service.mark_read(&auth, id).await?;
    Ok(Json(ApiResponse::ok(change)))
}

/// PUT /api/notifications/{id}/unread
pub async fn mark_unread(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<NotificationId>,
) -> Result<Json<ApiResponse<ReadStateChange>>, ApiError> {
    let change = state.notification_service.mark_unread(&auth, id).await?;
    Ok(Json(ApiResponse::ok(change)))
}

/// PUT /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<MarkedResponse>>, ApiError> {
    let marked = state.notification_service.mark_all_read(&auth).await?;
    Ok(Json(ApiResponse::ok(MarkedResponse { marked })))
}
