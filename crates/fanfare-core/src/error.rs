//! Error types for payload and batch validation.
//!
//! Covers the validation performed once at the orchestration boundary before
//! any recipient work is dispatched. Crypto and transport failures have their
//! own error types in the crates that produce them.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Validation errors for caller-supplied notification data.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    /// Notification payload failed validation.
    #[error("invalid notification: {message}")]
    InvalidNotification {
        /// What was wrong with the payload
        message: String,
    },

    /// Batch failed validation.
    #[error("invalid batch: {message}")]
    InvalidBatch {
        /// What was wrong with the batch
        message: String,
    },
}

impl CoreError {
    /// Creates a notification validation error.
    pub fn invalid_notification(message: impl Into<String>) -> Self {
        Self::InvalidNotification { message: message.into() }
    }

    /// Creates a batch validation error.
    pub fn invalid_batch(message: impl Into<String>) -> Self {
        Self::InvalidBatch { message: message.into() }
    }
}
