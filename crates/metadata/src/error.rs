//! Metadata store error types.

use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A concurrent writer inserted the same key first.
    #[error("unique constraint violation: {0}")]
    UniqueViolation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<MetadataError>,
    },
}

impl MetadataError {
    /// Whether this error is a lost first-insert race.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Config(e.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_message_carries_last_error() {
        let err = MetadataError::RetriesExhausted {
            attempts: 3,
            source: Box::new(MetadataError::UniqueViolation("health_meta".to_string())),
        };
        let msg = err.to_string();
        assert!(msg.contains("gave up after 3 attempts"));
        assert!(msg.contains("health_meta"));
        assert!(!err.is_unique_violation());
    }
}
