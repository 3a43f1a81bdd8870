//! Shared helpers for delivery integration tests.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use fanfare_core::{keys::VapidKeys, models::PushSubscription};
use p256::{
    elliptic_curve::{rand_core::OsRng, sec1::ToEncodedPoint},
    SecretKey,
};
use rand::Rng;

/// Builds a subscription with a freshly generated browser-side key pair.
pub fn test_subscription(endpoint: impl Into<String>) -> PushSubscription {
    let secret = SecretKey::random(&mut OsRng);
    let public = secret.public_key().to_encoded_point(false);
    let auth: [u8; 16] = rand::thread_rng().gen();

    PushSubscription::new(
        endpoint,
        URL_SAFE_NO_PAD.encode(public.as_bytes()),
        URL_SAFE_NO_PAD.encode(auth),
    )
}

/// Generates a throwaway VAPID key pair for engine construction.
pub fn test_keys() -> VapidKeys {
    fanfare_crypto::generate_keys("mailto:ops@example.com").expect("key generation")
}
