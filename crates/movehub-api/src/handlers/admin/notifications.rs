//! Admin notification management handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use validator::Validate;

use movehub_core::types::{NotificationId, PageRequest, PageResponse};
use movehub_database::store::GroupCount;
use movehub_entity::notification::Notification;
use movehub_service::notification::admin::{
    AnalyticsReport, BulkDeleteRequest, BulkDeleteResult,
};

use crate::dto::request::{AnalyticsQuery, CreateNotificationBody, ExtendBody, GroupsQuery};
use crate::dto::response::ApiResponse;
use crate::error::ApiError;
use crate::extractors::{AuthUser, PaginationParams};
use crate::state::AppState;

/// POST /api/admin/notifications
pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateNotificationBody>,
) -> Result<(StatusCode, Json<ApiResponse<Notification>>), ApiError> {
    auth.require_admin()?;
    body.validate()?;
    let created = state.admin_service.create(&auth, body.into()).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(created))))
}

/// GET /api/admin/notifications/groups
pub async fn groups(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<GroupsQuery>,
) -> Result<Json<ApiResponse<PageResponse<GroupCount>>>, ApiError> {
    auth.require_admin()?;
    let defaults = PageRequest::default();
    let page = PageRequest::new(
        query.page.unwrap_or(defaults.page),
        query.page_size.unwrap_or(defaults.page_size),
    );
    let result = state
        .admin_service
        .groups(&auth, query.group_by, page)
        .await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// GET /api/admin/notifications/pending-review
pub async fn pending_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<ApiResponse<PageResponse<Notification>>>, ApiError> {
    auth.require_admin()?;
    let result = state
        .admin_service
        .pending_review(&auth, params.into_page_request())
        .await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/admin/notifications/bulk-delete
pub async fn bulk_delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(req): Json<BulkDeleteRequest>,
) -> Result<Json<ApiResponse<BulkDeleteResult>>, ApiError> {
    auth.require_admin()?;
    let result = state.admin_service.bulk_delete(&auth, req).await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/admin/notifications/{id}/extend
pub async fn extend(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<NotificationId>,
    Json(body): Json<ExtendBody>,
) -> Result<Json<ApiResponse<Notification>>, ApiError> {
    auth.require_admin()?;
    body.validate()?;
    let extended = state.admin_service.extend(&auth, id, body.days).await?;
    Ok(Json(ApiResponse::ok(extended)))
}

/// GET /api/admin/notifications/analytics
pub async fn analytics(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<AnalyticsReport>>, ApiError> {
    auth.require_admin()?;
    let report = state.admin_service.analytics(&auth, query.days).await?;
    Ok(Json(ApiResponse::ok(report)))
}
