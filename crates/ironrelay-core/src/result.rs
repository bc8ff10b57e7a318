//! Convenience result type alias for IronRelay.

use crate::error::AppError;

/// A specialized `Result` type for IronRelay operations.
pub type AppResult<T> = Result<T, AppError>;
