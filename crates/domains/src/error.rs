//! # AppError
//!
//! Centralized error handling for the report desk.
//! Every failure is scoped to a single operation; none of these is fatal to
//! the process.

use thiserror::Error;

/// The primary error type for all domain and port operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Resource not found (e.g., Report, Block, Liveboard entry)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Malformed input, rejected before any storage write
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The requested status change is not allowed from the current state
    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    /// The chat platform refused or failed an outbound call
    #[error("external service unavailable: {0}")]
    ExternalUnavailable(String),

    /// Infrastructure failure (e.g., database unreachable, corrupt row)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        AppError::NotFound(entity.to_string(), id.to_string())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(..))
    }
}

/// A specialized Result type for report desk logic.
pub type Result<T> = std::result::Result<T, AppError>;
