//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use movehub_core::error::{AppError, ErrorKind};
use movehub_worker::JobError;

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// Handler error; wraps `AppError` so it can be turned into a response.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl From<JobError> for ApiError {
    fn from(e: JobError) -> Self {
        Self(e.into())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        Self(AppError::validation(e.to_string()))
    }
}

impl ApiError {
    /// HTTP status and error code for an error kind.
    pub fn status_of(kind: ErrorKind) -> (StatusCode, &'static str) {
        match kind {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ErrorKind::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ErrorKind::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ErrorKind::Conflict => (StatusCode::CONFLICT, "CONFLICT"),
            ErrorKind::ServiceUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE")
            }
            ErrorKind::Internal
            | ErrorKind::Database
            | ErrorKind::Configuration
            | ErrorKind::Serialization => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = Self::status_of(self.0.kind);
        let message = if status.is_server_error() {
            tracing::error!(kind = %self.0.kind, error = %self.0.message, "Request failed");
            // Store and driver details stay in the logs.
            match self.0.kind {
                ErrorKind::ServiceUnavailable => self.0.message,
                _ => "Internal server error".to_string(),
            }
        } else {
            self.0.message
        };

        let body = ApiErrorResponse {
            error: error_code.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::status_of(ErrorKind::Validation).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::status_of(ErrorKind::Conflict).0, StatusCode::CONFLICT);
        assert_eq!(
            ApiError::status_of(ErrorKind::Database).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_job_conflict_maps_to_409() {
        let response = ApiError::from(JobError::AlreadyRunning("cleanup")).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
