//! Job execution errors.

use movehub_core::error::AppError;

/// Error from a job run.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Another run of the same job holds the running flag.
    #[error("Job '{0}' is already running")]
    AlreadyRunning(&'static str),

    /// Transient failure; the next scheduled run may succeed.
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::AlreadyRunning(name) => {
                AppError::conflict(format!("Job '{name}' is already running"))
            }
            JobError::Transient(msg) => AppError::service_unavailable(msg),
            JobError::Internal(e) => e,
        }
    }
}
