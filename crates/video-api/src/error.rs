//! Error types for video-api

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoApiError {
    /// A bucket environment variable is not set
    #[error("{0}")]
    MissingConfig(String),

    /// Object store call failed
    #[error("object store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, VideoApiError>;
