//! Error types for push delivery operations.
//!
//! Transport internals use these to classify outcomes; past the transport
//! boundary every outcome becomes a `DeliveryResult` value carrying a
//! status from the shared taxonomy, never a raised error.

use fanfare_core::models::DeliveryStatus;
use fanfare_crypto::CryptoError;
use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Failures occurring while delivering a push message.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Connection-level failure before a response was received.
    #[error("network connection failed: {message}")]
    Network {
        /// Error message describing the network failure
        message: String,
    },

    /// Client-side request timeout exceeded.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Number of seconds before the request timed out
        timeout_seconds: u64,
    },

    /// The push service answered with a non-2xx status.
    #[error("push service returned HTTP {status}")]
    Http {
        /// HTTP status code from the push service
        status: u16,
        /// Response body content, possibly empty
        body: String,
    },

    /// Subscription endpoint URL could not be parsed.
    #[error("invalid subscription endpoint: {message}")]
    InvalidEndpoint {
        /// What was wrong with the endpoint
        message: String,
    },

    /// Encryption or signing failed for a recipient.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,

    /// Invalid transport or engine configuration.
    #[error("invalid configuration: {message}")]
    Configuration {
        /// Configuration error message
        message: String,
    },

    /// Unexpected internal error.
    #[error("internal delivery error: {message}")]
    Internal {
        /// Internal error message
        message: String,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates an HTTP status error.
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http { status, body: body.into() }
    }

    /// Creates an invalid endpoint error.
    pub fn invalid_endpoint(message: impl Into<String>) -> Self {
        Self::InvalidEndpoint { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Maps this error into the shared delivery status taxonomy.
    pub fn status(&self) -> DeliveryStatus {
        match self {
            Self::Network { .. } => DeliveryStatus::NetworkError,
            // Cancellation surfaces through the same terminal status as a
            // client-side timeout.
            Self::Timeout { .. } | Self::Cancelled => DeliveryStatus::Timeout,
            Self::Http { status, .. } => DeliveryStatus::from_http_status(*status),
            Self::InvalidEndpoint { .. } => DeliveryStatus::InvalidSubscription,
            Self::Crypto(e) if e.is_subscription_error() => DeliveryStatus::InvalidSubscription,
            Self::Crypto(_) => DeliveryStatus::EncryptionFailed,
            Self::Configuration { .. } | Self::Internal { .. } => DeliveryStatus::InternalError,
        }
    }

    /// Whether the transport may retry after this error.
    ///
    /// Follows the taxonomy's retryable set; client-side timeouts and
    /// cancellations are always terminal.
    pub fn is_retryable(&self) -> bool {
        self.status().is_retryable()
    }
}
