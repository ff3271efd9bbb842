//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid package coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("invalid fetch status: {0}")]
    InvalidStatus(String),

    #[error("invalid metadata kind: {0}")]
    InvalidKind(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
