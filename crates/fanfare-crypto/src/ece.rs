//! aes128gcm message encryption for web push (RFC 8291 / RFC 8188).
//!
//! Produces the single-record binary framing a push service relays to the
//! browser: ECDH key agreement against the subscription's P-256 key,
//! HKDF-SHA256 derivation of the content encryption key and nonce, then
//! AES-128-GCM over the padded plaintext.
//!
//! Every message uses a fresh ephemeral key pair and salt; encrypting the
//! same plaintext twice yields unrelated ciphertexts that both decrypt to
//! the original.

use aes_gcm::{aead::Aead, Aes128Gcm, Key, KeyInit, Nonce};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hkdf::Hkdf;
use p256::{
    ecdh::EphemeralSecret,
    elliptic_curve::{rand_core::OsRng, sec1::ToEncodedPoint},
    PublicKey,
};
use rand::Rng;
use sha2::Sha256;

use crate::error::{CryptoError, Result};

const IKM_INFO_PREFIX: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

const PUBLIC_KEY_LENGTH: usize = 65;
const AUTH_SECRET_LENGTH: usize = 16;
const SALT_LENGTH: usize = 16;
const IKM_LENGTH: usize = 32;
const KEY_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;

/// Fixed record size declared in the header. A single record is always
/// emitted; oversized payloads are rejected by the push service.
const RECORD_SIZE: u32 = 4096;

/// RFC 8188 delimiter marking the final (here: only) record.
const RECORD_DELIMITER: u8 = 0x02;

/// Framing header length: salt(16) + record size(4) + key id length(1) +
/// ephemeral public key(65).
pub const HEADER_LENGTH: usize = SALT_LENGTH + 4 + 1 + PUBLIC_KEY_LENGTH;

/// Encrypts a plaintext for one push subscription.
///
/// `p256dh` and `auth` are the subscription's base64url-encoded client
/// public key and auth secret. Returns the complete aes128gcm body:
/// 86-byte header followed by ciphertext and 16-byte tag, so the output is
/// always `86 + plaintext.len() + 1 + 16` bytes.
///
/// # Errors
///
/// Returns a [`CryptoError`] when the client material is malformed or the
/// AEAD primitive fails; a partial frame is never returned.
pub fn encrypt(p256dh: &str, auth: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
    let client_public = decode_client_public_key(p256dh)?;
    let auth_secret = decode_auth_secret(auth)?;

    let salt: [u8; SALT_LENGTH] = rand::thread_rng().gen();
    let ephemeral_secret = EphemeralSecret::random(&mut OsRng);
    encrypt_with(&client_public, &auth_secret, &salt, &ephemeral_secret, plaintext)
}

/// Core encryption over already-validated material and caller-provided
/// randomness. Split out so the round-trip tests can drive it directly.
fn encrypt_with(
    client_public: &[u8],
    auth_secret: &[u8],
    salt: &[u8; SALT_LENGTH],
    ephemeral_secret: &EphemeralSecret,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let client_key = PublicKey::from_sec1_bytes(client_public)
        .map_err(|e| CryptoError::invalid_public_key(format!("not a valid P-256 point: {e}")))?;

    let ephemeral_public = ephemeral_secret.public_key().to_encoded_point(false);
    let shared_secret = ephemeral_secret.diffie_hellman(&client_key);

    let ikm_info = ikm_info(client_public, ephemeral_public.as_bytes());
    let ikm =
        hkdf_sha256(auth_secret, &shared_secret.raw_secret_bytes()[..], &ikm_info, IKM_LENGTH)?;
    let cek = hkdf_sha256(salt, &ikm, CEK_INFO, KEY_LENGTH)?;
    let nonce = hkdf_sha256(salt, &ikm, NONCE_INFO, NONCE_LENGTH)?;

    // Single record: plaintext plus the final-record delimiter, no further
    // padding.
    let mut record = Vec::with_capacity(plaintext.len() + 1);
    record.extend_from_slice(plaintext);
    record.push(RECORD_DELIMITER);

    let ciphertext = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&cek))
        .encrypt(Nonce::from_slice(&nonce), record.as_slice())
        .map_err(|_| CryptoError::encryption("AEAD encryption failed"))?;

    let key_id = ephemeral_public.as_bytes();
    let mut output = Vec::with_capacity(HEADER_LENGTH + ciphertext.len());
    output.extend_from_slice(salt);
    output.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    output.push(key_id.len() as u8);
    output.extend_from_slice(key_id);
    output.extend_from_slice(&ciphertext);

    Ok(output)
}

fn decode_client_public_key(p256dh: &str) -> Result<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(p256dh.trim_end_matches('='))
        .map_err(|e| CryptoError::invalid_public_key(format!("invalid base64url: {e}")))?;

    if bytes.len() != PUBLIC_KEY_LENGTH {
        return Err(CryptoError::invalid_public_key(format!(
            "expected {PUBLIC_KEY_LENGTH} bytes, got {}",
            bytes.len()
        )));
    }
    if bytes[0] != 0x04 {
        return Err(CryptoError::invalid_public_key(
            "missing uncompressed point marker 0x04",
        ));
    }

    Ok(bytes)
}

fn decode_auth_secret(auth: &str) -> Result<Vec<u8>> {
    let bytes = URL_SAFE_NO_PAD
        .decode(auth.trim_end_matches('='))
        .map_err(|e| CryptoError::invalid_auth_secret(format!("invalid base64url: {e}")))?;

    if bytes.len() != AUTH_SECRET_LENGTH {
        return Err(CryptoError::invalid_auth_secret(format!(
            "expected {AUTH_SECRET_LENGTH} bytes, got {}",
            bytes.len()
        )));
    }

    Ok(bytes)
}

/// Builds the HKDF info for the initial keying material:
/// `"WebPush: info" || 0x00 || client_public(65) || ephemeral_public(65)`.
fn ikm_info(client_public: &[u8], ephemeral_public: &[u8]) -> Vec<u8> {
    let mut info =
        Vec::with_capacity(IKM_INFO_PREFIX.len() + PUBLIC_KEY_LENGTH + PUBLIC_KEY_LENGTH);
    info.extend_from_slice(IKM_INFO_PREFIX);
    info.extend_from_slice(client_public);
    info.extend_from_slice(ephemeral_public);
    info
}

fn hkdf_sha256(salt: &[u8], ikm: &[u8], info: &[u8], length: usize) -> Result<Vec<u8>> {
    let (_, hk) = Hkdf::<Sha256>::extract(Some(salt), ikm);
    let mut okm = vec![0u8; length];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::key_agreement(format!("HKDF expand failed: {e}")))?;
    Ok(okm)
}

#[cfg(test)]
mod tests {
    use p256::SecretKey;

    use super::*;

    const TAG_LENGTH: usize = 16;

    struct TestSubscription {
        secret: SecretKey,
        p256dh: String,
        auth_bytes: [u8; AUTH_SECRET_LENGTH],
        auth: String,
    }

    fn test_subscription() -> TestSubscription {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key().to_encoded_point(false);
        let auth_bytes: [u8; AUTH_SECRET_LENGTH] = rand::thread_rng().gen();

        TestSubscription {
            secret,
            p256dh: URL_SAFE_NO_PAD.encode(public.as_bytes()),
            auth_bytes,
            auth: URL_SAFE_NO_PAD.encode(auth_bytes),
        }
    }

    /// Inverse of the aes128gcm framing, run with the subscription's private
    /// key as a browser would.
    fn decrypt(sub: &TestSubscription, body: &[u8]) -> Vec<u8> {
        let salt = &body[0..SALT_LENGTH];
        let record_size = u32::from_be_bytes(body[16..20].try_into().unwrap());
        assert_eq!(record_size, RECORD_SIZE);
        let key_id_length = body[20] as usize;
        assert_eq!(key_id_length, PUBLIC_KEY_LENGTH);
        let server_public = &body[21..21 + PUBLIC_KEY_LENGTH];
        let ciphertext = &body[HEADER_LENGTH..];

        let server_key = PublicKey::from_sec1_bytes(server_public).unwrap();
        let shared_secret =
            p256::ecdh::diffie_hellman(sub.secret.to_nonzero_scalar(), server_key.as_affine());

        let client_public = URL_SAFE_NO_PAD.decode(&sub.p256dh).unwrap();
        let info = ikm_info(&client_public, server_public);
        let ikm = hkdf_sha256(
            &sub.auth_bytes,
            &shared_secret.raw_secret_bytes()[..],
            &info,
            IKM_LENGTH,
        )
        .unwrap();
        let cek = hkdf_sha256(salt, &ikm, CEK_INFO, KEY_LENGTH).unwrap();
        let nonce = hkdf_sha256(salt, &ikm, NONCE_INFO, NONCE_LENGTH).unwrap();

        let record = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(&cek))
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .expect("AEAD decryption should succeed");

        assert_eq!(*record.last().unwrap(), RECORD_DELIMITER);
        record[..record.len() - 1].to_vec()
    }

    #[test]
    fn output_length_is_header_plus_plaintext_delimiter_and_tag() {
        let sub = test_subscription();
        for len in [0, 1, 16, 255, 1024, 3993] {
            let plaintext = vec![0x5a; len];
            let body = encrypt(&sub.p256dh, &sub.auth, &plaintext).unwrap();
            assert_eq!(body.len(), HEADER_LENGTH + len + 1 + TAG_LENGTH, "plaintext len {len}");
        }
    }

    #[test]
    fn header_layout_matches_rfc8188() {
        let sub = test_subscription();
        let body = encrypt(&sub.p256dh, &sub.auth, b"hello").unwrap();

        // record size 4096 big-endian at offset 16
        assert_eq!(&body[16..20], &[0x00, 0x00, 0x10, 0x00]);
        // key id length 65 at offset 20
        assert_eq!(body[20], 65);
        // key id is an uncompressed point
        assert_eq!(body[21], 0x04);
    }

    #[test]
    fn round_trips_through_browser_side_decryption() {
        let sub = test_subscription();
        let plaintext = br#"{"title":"hi","body":"there"}"#;

        let body = encrypt(&sub.p256dh, &sub.auth, plaintext).unwrap();

        assert_eq!(decrypt(&sub, &body), plaintext);
    }

    #[test]
    fn fresh_salt_and_ephemeral_key_per_message() {
        let sub = test_subscription();
        let plaintext = b"same plaintext";

        let first = encrypt(&sub.p256dh, &sub.auth, plaintext).unwrap();
        let second = encrypt(&sub.p256dh, &sub.auth, plaintext).unwrap();

        assert_ne!(first, second);
        // Distinct salts and distinct ephemeral keys.
        assert_ne!(first[0..16], second[0..16]);
        assert_ne!(first[21..86], second[21..86]);
        // Both decrypt to the original.
        assert_eq!(decrypt(&sub, &first), plaintext);
        assert_eq!(decrypt(&sub, &second), plaintext);
    }

    #[test]
    fn rejects_public_key_of_wrong_length() {
        let sub = test_subscription();
        let short = URL_SAFE_NO_PAD.encode([0x04u8; 33]);

        let err = encrypt(&short, &sub.auth, b"x").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPublicKey { .. }), "got {err}");
    }

    #[test]
    fn rejects_public_key_without_uncompressed_marker() {
        let sub = test_subscription();
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        bytes[0] = 0x02;
        let compressed_marker = URL_SAFE_NO_PAD.encode(bytes);

        let err = encrypt(&compressed_marker, &sub.auth, b"x").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPublicKey { .. }), "got {err}");
    }

    #[test]
    fn rejects_public_key_not_on_curve() {
        let sub = test_subscription();
        // Correct length and marker, but not a curve point.
        let mut bytes = [0xffu8; PUBLIC_KEY_LENGTH];
        bytes[0] = 0x04;
        let off_curve = URL_SAFE_NO_PAD.encode(bytes);

        let err = encrypt(&off_curve, &sub.auth, b"x").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidPublicKey { .. }), "got {err}");
    }

    #[test]
    fn rejects_auth_secret_of_wrong_length() {
        let sub = test_subscription();
        let short = URL_SAFE_NO_PAD.encode([0u8; 8]);

        let err = encrypt(&sub.p256dh, &short, b"x").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidAuthSecret { .. }), "got {err}");
    }

    #[test]
    fn rejects_undecodable_base64() {
        let sub = test_subscription();
        assert!(encrypt("!!not base64!!", &sub.auth, b"x").is_err());
        assert!(encrypt(&sub.p256dh, "!!not base64!!", b"x").is_err());
    }

    #[test]
    fn accepts_padded_base64url_input() {
        // Some browsers hand out padded base64url; trailing '=' is tolerated.
        let sub = test_subscription();
        // 16 auth bytes encode to 22 characters, so canonical padding is '=='.
        let padded_auth = format!("{}==", &sub.auth);

        assert!(encrypt(&sub.p256dh, &padded_auth, b"x").is_ok());
    }
}
