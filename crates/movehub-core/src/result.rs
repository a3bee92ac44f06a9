//! Convenience result type alias for MoveHub.

use crate::error::AppError;

/// A specialized `Result` type for MoveHub operations.
pub type AppResult<T> = Result<T, AppError>;
