//! Error types for obwatch-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid side code: {0}")]
    InvalidSide(u8),

    #[error("Invalid book action code: {0}")]
    InvalidAction(u8),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
