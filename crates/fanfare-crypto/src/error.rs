//! Error types for encryption and signing operations.
//!
//! Crypto errors cover malformed inputs and primitive failures only;
//! transient conditions do not exist at this layer. The orchestrator maps
//! subscription-shaped variants to its invalid-subscription status and
//! everything else to encryption-failed.

use thiserror::Error;

/// Result type alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Failures from message encryption, key handling, and token signing.
#[derive(Debug, Clone, Error)]
pub enum CryptoError {
    /// Client ECDH public key is not a 65-byte uncompressed P-256 point.
    #[error("invalid client public key: {message}")]
    InvalidPublicKey {
        /// What was wrong with the key material
        message: String,
    },

    /// Client auth secret is not exactly 16 bytes.
    #[error("invalid client auth secret: {message}")]
    InvalidAuthSecret {
        /// What was wrong with the secret
        message: String,
    },

    /// VAPID key pair is malformed or off-curve.
    #[error("invalid VAPID key pair: {message}")]
    InvalidKeyPair {
        /// What was wrong with the key pair
        message: String,
    },

    /// JWT audience or subject failed validation.
    #[error("invalid token claims: {message}")]
    InvalidClaims {
        /// What was wrong with the claims
        message: String,
    },

    /// ECDH key agreement or key derivation failed.
    #[error("key agreement failed: {message}")]
    KeyAgreement {
        /// Underlying primitive failure
        message: String,
    },

    /// AEAD encryption failed.
    #[error("encryption failed: {message}")]
    Encryption {
        /// Underlying primitive failure
        message: String,
    },

    /// ECDSA signing failed.
    #[error("signing failed: {message}")]
    Signing {
        /// Underlying primitive failure
        message: String,
    },
}

impl CryptoError {
    /// Creates an invalid public key error.
    pub fn invalid_public_key(message: impl Into<String>) -> Self {
        Self::InvalidPublicKey { message: message.into() }
    }

    /// Creates an invalid auth secret error.
    pub fn invalid_auth_secret(message: impl Into<String>) -> Self {
        Self::InvalidAuthSecret { message: message.into() }
    }

    /// Creates an invalid key pair error.
    pub fn invalid_key_pair(message: impl Into<String>) -> Self {
        Self::InvalidKeyPair { message: message.into() }
    }

    /// Creates an invalid claims error.
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims { message: message.into() }
    }

    /// Creates a key agreement error.
    pub fn key_agreement(message: impl Into<String>) -> Self {
        Self::KeyAgreement { message: message.into() }
    }

    /// Creates an encryption error.
    pub fn encryption(message: impl Into<String>) -> Self {
        Self::Encryption { message: message.into() }
    }

    /// Creates a signing error.
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing { message: message.into() }
    }

    /// Whether this error describes malformed subscription material rather
    /// than a failure of the sender's own keys or primitives.
    ///
    /// The orchestrator classifies these as invalid-subscription outcomes.
    pub const fn is_subscription_error(&self) -> bool {
        matches!(self, Self::InvalidPublicKey { .. } | Self::InvalidAuthSecret { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_errors_identified() {
        assert!(CryptoError::invalid_public_key("short").is_subscription_error());
        assert!(CryptoError::invalid_auth_secret("short").is_subscription_error());

        assert!(!CryptoError::invalid_key_pair("bad").is_subscription_error());
        assert!(!CryptoError::encryption("aead").is_subscription_error());
        assert!(!CryptoError::signing("ecdsa").is_subscription_error());
    }

    #[test]
    fn error_display_format() {
        let error = CryptoError::invalid_public_key("expected 65 bytes, got 3");
        assert_eq!(error.to_string(), "invalid client public key: expected 65 bytes, got 3");
    }
}
