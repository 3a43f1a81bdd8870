//! Web push cryptography: message encryption and server identification.
//!
//! Implements the two cryptographic halves of encrypted web push:
//!
//! 1. **Message encryption** (RFC 8291 / RFC 8188): ECDH key agreement on
//!    P-256, HKDF-SHA256 key derivation, AES-128-GCM, and the `aes128gcm`
//!    single-record binary framing.
//! 2. **VAPID signing** (RFC 8292): ES256 JWT construction identifying the
//!    application server to the push service.
//!
//! Both halves are pure aside from randomness and the injected clock; all
//! failures surface as [`CryptoError`] values, never as transient
//! conditions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod ece;
pub mod error;
pub mod vapid;

pub use ece::encrypt;
pub use error::{CryptoError, Result};
pub use vapid::{
    authorization_header, generate_keys, validate_keys, VapidSigner, DEFAULT_TOKEN_TTL,
};
