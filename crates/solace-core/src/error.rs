//! # AppError
//!
//! Centralized error handling for the Solace services.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all service operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Post, Comment, Journal entry, Badge)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Validation failure (e.g., empty title, oversized image)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// No signed-in user, or the token did not verify
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Signed in, but not allowed to touch this resource (e.g., someone else's post)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Concurrent writers kept invalidating each other
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (e.g., DB down, disk full)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        AppError::NotFound(kind.to_string(), id.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{err:#}"))
    }
}

/// A specialized Result type for Solace logic.
pub type Result<T> = std::result::Result<T, AppError>;
