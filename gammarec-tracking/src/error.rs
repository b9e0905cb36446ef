//! Error types for gammarec-tracking.

use thiserror::Error;

/// Result type alias for tracking operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring or running the tracking stages.
#[derive(Error, Debug)]
pub enum Error {
    /// Event data model failure.
    #[error(transparent)]
    Core(#[from] gammarec_core::Error),

    /// Response-file failure during strategy setup.
    #[error(transparent)]
    Response(#[from] gammarec_response::Error),

    /// Unusable tracking configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
