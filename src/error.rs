//! Error types for schema resolution, validation and form submission.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationError;

/// Errors during schema loading and resolution.
///
/// Only the reference errors are raised while rendering; every other
/// structural problem becomes an unsupported field in the descriptor tree.
#[derive(Debug, Error)]
pub enum ResolveError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    // Schema errors (exit code 2)
    #[error("Could not find a definition for {reference}")]
    MissingDefinition { reference: String },

    #[error("circular $ref chain through {reference}")]
    CircularReference { reference: String },

    #[error("unsupported $ref {reference}: only local '#' pointers are resolved")]
    UnsupportedReference { reference: String },
}

impl ResolveError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ResolveError::FileNotFound { .. } | ResolveError::ReadError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors during validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("invalid schema: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<ValidationError> },
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Resolve(e) => e.exit_code(),
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}

/// Errors returned by [`FormState::submit`](crate::FormState::submit).
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Validate(#[from] ValidateError),

    #[error("form has {} validation error(s)", errors.len())]
    Invalid { errors: Vec<ValidationError> },
}

impl SubmitError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SubmitError::Resolve(e) => e.exit_code(),
            SubmitError::Validate(e) => e.exit_code(),
            SubmitError::Invalid { .. } => 1,
        }
    }
}
