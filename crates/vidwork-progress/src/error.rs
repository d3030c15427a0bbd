//! Progress tracker error types.

use thiserror::Error;

pub type ProgressResult<T> = Result<T, ProgressError>;

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
