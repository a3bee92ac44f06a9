//! Job control handlers.

use axum::Json;
use axum::extract::{Path, State};

use movehub_worker::JobName;
use movehub_worker::scheduler::SchedulerStatus;

use crate::dto::response::{ApiResponse, JobActionResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/admin/jobs/status
pub async fn status(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<SchedulerStatus>>, ApiError> {
    auth.require_admin()?;
    Ok(Json(ApiResponse::ok(state.scheduler.status().await)))
}

/// POST /api/admin/jobs/{name}/run
pub async fn run_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<JobActionResponse>>, ApiError> {
    auth.require_admin()?;
    let job: JobName = name.parse()?;
    let counts = state.scheduler.run_job(job).await?;
    Ok(Json(ApiResponse::ok(JobActionResponse {
        job: job.to_string(),
        counts: Some(
            counts
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ),
        message: "Job run completed".to_string(),
    })))
}

/// POST /api/admin/jobs/{name}/restart
pub async fn restart_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<JobActionResponse>>, ApiError> {
    auth.require_admin()?;
    let job: JobName = name.parse()?;
    state.scheduler.restart_job(job).await?;
    Ok(Json(ApiResponse::ok(JobActionResponse {
        job: job.to_string(),
        counts: None,
        message: "Job schedule restarted".to_string(),
    })))
}
