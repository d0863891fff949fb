//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type FeedResult<T> = Result<T, FeedError>;
