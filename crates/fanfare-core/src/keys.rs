//! VAPID application server key material.
//!
//! Data-only: generation and validation live in the crypto crate so this
//! crate stays free of curve arithmetic.

use serde::{Deserialize, Serialize};

/// VAPID key pair identifying the application server (RFC 8292).
///
/// The public key is the uncompressed SEC1 point (65 bytes, base64url); the
/// private key is the raw 32-byte P-256 scalar (base64url). The subject is a
/// `mailto:` or `https:` contact URI.
///
/// Generated once out-of-band and long-lived: push services may bind the
/// public key to a subscription, so regenerating between sends to the same
/// subscriptions breaks delivery. The JSON form round-trips exactly the
/// three fields `publicKey`, `privateKey`, `subject`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeys {
    /// Uncompressed public key bytes (base64url, 65 bytes decoded).
    pub public_key: String,
    /// Raw 32-byte private key scalar (base64url).
    pub private_key: String,
    /// Contact URI sent as the JWT `sub` claim.
    pub subject: String,
}

impl VapidKeys {
    /// Creates a key pair from pre-existing base64url components.
    pub fn new(
        public_key: impl Into<String>,
        private_key: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
            subject: subject.into(),
        }
    }
}
