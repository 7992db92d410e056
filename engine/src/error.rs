//! Error types for the Quill engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    /// Flat form key of the offending field
    pub field: String,
    /// Human readable reason
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All possible errors from the Quill engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Lookup errors
    #[error("unknown field path: {0}")]
    UnknownFieldPath(String),

    #[error("unknown form key: {0}")]
    UnknownFormKey(String),

    // Validation errors
    #[error("validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    // State errors
    #[error("no product loaded")]
    NotLoaded,

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
