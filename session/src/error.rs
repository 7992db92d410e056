//! Unified error handling for editing sessions.

use quill_engine::FieldError;
use uuid::Uuid;

use crate::api::ApiError;
use crate::config::ConfigError;

/// Session error type.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Engine error: {0}")]
    Engine(quill_engine::Error),

    /// The form failed validation; nothing was sent.
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("A save is already in progress")]
    SaveInProgress,

    #[error("Save failed: {0}")]
    SaveFailed(#[source] ApiError),

    #[error("{0} unresolved conflict(s) with the platform")]
    UnresolvedConflicts(usize),

    #[error("Conflict check failed: {0}")]
    ConflictCheckFailed(#[source] ApiError),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] ApiError),

    #[error("Version not found: {0}")]
    VersionNotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<quill_engine::Error> for SessionError {
    fn from(err: quill_engine::Error) -> Self {
        match err {
            quill_engine::Error::Validation(errors) => SessionError::Validation(errors),
            other => SessionError::Engine(other),
        }
    }
}

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_validation_is_lifted() {
        let err: SessionError = quill_engine::Error::Validation(vec![FieldError::new(
            "title",
            "is required",
        )])
        .into();
        match err {
            SessionError::Validation(errors) => assert_eq!(errors[0].field, "title"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_other_engine_errors_stay_wrapped() {
        let err: SessionError = quill_engine::Error::NotLoaded.into();
        assert!(matches!(err, SessionError::Engine(quill_engine::Error::NotLoaded)));
    }
}
