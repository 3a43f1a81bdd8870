//! VAPID token signing and key management (RFC 8292).
//!
//! Builds the compact ES256 JWT a push service uses to identify the
//! application server, plus generation and validation of the underlying
//! P-256 key pair. The private key is handled as the raw 32-byte scalar and
//! the public key as the uncompressed SEC1 point, both base64url.

use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use p256::{
    ecdsa::{signature::Signer, Signature, SigningKey},
    elliptic_curve::{rand_core::OsRng, sec1::ToEncodedPoint},
    PublicKey,
};
use serde::Serialize;

use fanfare_core::{
    keys::VapidKeys,
    time::{Clock, SystemClock},
};

use crate::error::{CryptoError, Result};

/// Default token lifetime: 12 hours, the maximum RFC 8292 permits is 24.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(43_200);

const PUBLIC_KEY_LENGTH: usize = 65;
const PRIVATE_KEY_LENGTH: usize = 32;

#[derive(Serialize)]
struct Header {
    typ: &'static str,
    alg: &'static str,
}

#[derive(Serialize)]
struct Claims<'a> {
    aud: &'a str,
    exp: u64,
    sub: &'a str,
}

/// Generates a fresh VAPID key pair for the given subject.
///
/// The subject must be a `mailto:` or `https:` contact URI; it becomes the
/// JWT `sub` claim on every token. Keys are long-lived: push services may
/// bind the public key to a subscription, so generate once and persist.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidClaims`] when the subject is malformed.
pub fn generate_keys(subject: impl Into<String>) -> Result<VapidKeys> {
    let subject = subject.into();
    validate_subject(&subject)?;

    let signing_key = SigningKey::random(&mut OsRng);
    let verifying_key = signing_key.verifying_key();

    // SEC1 uncompressed public key (65 bytes: 0x04 || x || y)
    let public_bytes = verifying_key.to_encoded_point(false);

    Ok(VapidKeys {
        public_key: URL_SAFE_NO_PAD.encode(public_bytes.as_bytes()),
        private_key: URL_SAFE_NO_PAD.encode(signing_key.to_bytes()),
        subject,
    })
}

/// Validates a key pair without constructing a signer.
///
/// Usable independently of any engine initialization, e.g. at configuration
/// load time.
///
/// # Errors
///
/// Returns [`CryptoError::InvalidKeyPair`] when either key is malformed or
/// off the curve, [`CryptoError::InvalidClaims`] for a bad subject.
pub fn validate_keys(keys: &VapidKeys) -> Result<()> {
    validate_subject(&keys.subject)?;
    decode_public_key(&keys.public_key)?;
    decode_signing_key(&keys.private_key)?;
    Ok(())
}

fn validate_subject(subject: &str) -> Result<()> {
    if subject.is_empty() {
        return Err(CryptoError::invalid_claims("subject must not be empty"));
    }
    if !subject.starts_with("mailto:") && !subject.starts_with("https:") {
        return Err(CryptoError::invalid_claims(
            "subject must be a mailto: or https: URI",
        ));
    }
    Ok(())
}

fn decode_public_key(public_key: &str) -> Result<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(public_key.trim_end_matches('='))
        .map_err(|e| CryptoError::invalid_key_pair(format!("public key base64url: {e}")))?;

    if bytes.len() != PUBLIC_KEY_LENGTH || bytes[0] != 0x04 {
        return Err(CryptoError::invalid_key_pair(
            "public key must be a 65-byte uncompressed P-256 point",
        ));
    }
    PublicKey::from_sec1_bytes(&bytes)
        .map_err(|e| CryptoError::invalid_key_pair(format!("public key not on curve: {e}")))?;

    Ok(bytes)
}

fn decode_signing_key(private_key: &str) -> Result<SigningKey> {
    let bytes = URL_SAFE_NO_PAD
        .decode(private_key.trim_end_matches('='))
        .map_err(|e| CryptoError::invalid_key_pair(format!("private key base64url: {e}")))?;

    if bytes.len() != PRIVATE_KEY_LENGTH {
        return Err(CryptoError::invalid_key_pair(format!(
            "private key must be a {PRIVATE_KEY_LENGTH}-byte scalar, got {} bytes",
            bytes.len()
        )));
    }

    SigningKey::from_bytes(bytes.as_slice().into())
        .map_err(|e| CryptoError::invalid_key_pair(format!("private key not a valid scalar: {e}")))
}

/// ES256 JWT signing service for VAPID authentication.
///
/// Validates the key pair once at construction and signs tokens scoped to a
/// push service audience. Each call re-reads the clock for the `exp` claim,
/// so repeated signatures differ as time advances.
#[derive(Debug)]
pub struct VapidSigner {
    signing_key: SigningKey,
    public_key: String,
    subject: String,
    clock: Arc<dyn Clock>,
}

impl VapidSigner {
    /// Creates a signer from a validated key pair, using the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyPair`] or
    /// [`CryptoError::InvalidClaims`] when the key pair fails validation.
    pub fn new(keys: &VapidKeys) -> Result<Self> {
        Self::with_clock(keys, Arc::new(SystemClock))
    }

    /// Creates a signer with an injected clock for deterministic tests.
    pub fn with_clock(keys: &VapidKeys, clock: Arc<dyn Clock>) -> Result<Self> {
        validate_subject(&keys.subject)?;
        decode_public_key(&keys.public_key)?;
        let signing_key = decode_signing_key(&keys.private_key)?;

        Ok(Self {
            signing_key,
            public_key: keys.public_key.clone(),
            subject: keys.subject.clone(),
            clock,
        })
    }

    /// Signs a token for the given audience with the default 12-hour expiry.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidClaims`] for an empty audience.
    pub fn sign(&self, audience: &str) -> Result<String> {
        self.sign_with_expiry(audience, DEFAULT_TOKEN_TTL)
    }

    /// Signs a token expiring `expiry` from now.
    ///
    /// The compact form is `base64url(header).base64url(claims).base64url(
    /// r || s)` with no padding; the signature is the raw 64-byte ECDSA
    /// output, not DER.
    pub fn sign_with_expiry(&self, audience: &str, expiry: Duration) -> Result<String> {
        if audience.is_empty() {
            return Err(CryptoError::invalid_claims("audience must not be empty"));
        }

        let header = serde_json::to_vec(&Header { typ: "JWT", alg: "ES256" })
            .map_err(|e| CryptoError::signing(format!("header serialization: {e}")))?;
        let claims = serde_json::to_vec(&Claims {
            aud: audience,
            exp: self.clock.unix_timestamp() + expiry.as_secs(),
            sub: &self.subject,
        })
        .map_err(|e| CryptoError::signing(format!("claims serialization: {e}")))?;

        let signing_input =
            format!("{}.{}", URL_SAFE_NO_PAD.encode(header), URL_SAFE_NO_PAD.encode(claims));
        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());

        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.to_bytes())))
    }

    /// Base64url public key sent alongside every token.
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Subject claim this signer was configured with.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Builds the `Authorization` header value for a signed token:
/// `vapid t={token}, k={public key}`.
pub fn authorization_header(token: &str, public_key: &str) -> String {
    format!("vapid t={token}, k={public_key}")
}
