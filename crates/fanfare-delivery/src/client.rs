//! HTTP transport for push services with retry and timeout handling.
//!
//! The only component performing network I/O. Builds the RFC 8030 request
//! (encrypted body, VAPID authorization, TTL/Urgency headers plus
//! platform-specific additions), classifies every response through the
//! shared status taxonomy, and retries the retryable subset with
//! exponential backoff.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use fanfare_core::{
    models::{DeliveryResult, Platform, Urgency},
    time::{Clock, SystemClock},
};
use fanfare_crypto::authorization_header;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::error::{DeliveryError, Result};

/// Configuration for the push transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Client-wide timeout for each HTTP attempt.
    pub timeout: Duration,
    /// Number of retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay for exponential backoff; attempt `n` waits `delay * 2^n`.
    pub retry_delay: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            max_retries: crate::DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(1),
            user_agent: "fanfare-web-push/0.1".to_string(),
        }
    }
}

/// One fully-prepared push submission.
///
/// The ciphertext is held as [`Bytes`] so the body can be re-materialized
/// cheaply for every retry attempt.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Subscription endpoint URL.
    pub endpoint: String,
    /// Complete aes128gcm body (header + ciphertext + tag).
    pub ciphertext: Bytes,
    /// Signed VAPID token scoped to this endpoint's origin.
    pub vapid_token: String,
    /// Base64url VAPID public key advertised with the token.
    pub vapid_public_key: String,
    /// Detected push service platform, for conditional headers.
    pub platform: Platform,
    /// Message time-to-live in seconds.
    pub ttl: u32,
    /// Delivery urgency hint.
    pub urgency: Urgency,
    /// Optional replacement topic.
    pub topic: Option<String>,
}

/// HTTP client optimized for push delivery.
///
/// Wraps a pooled `reqwest::Client` so connections to push services are
/// reused across recipients and batches. All outcomes, including network
/// failures and exhausted retries, are returned as [`DeliveryResult`]
/// values; this type never raises past its own boundary.
#[derive(Debug, Clone)]
pub struct PushClient {
    client: reqwest::Client,
    config: TransportConfig,
    clock: Arc<dyn Clock>,
}

impl PushClient {
    /// Creates a new push client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the underlying HTTP client
    /// cannot be built.
    pub fn new(config: TransportConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a push client with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(TransportConfig::default())
    }

    /// Creates a push client with an injected clock for deterministic retry
    /// schedules in tests.
    pub fn with_clock(config: TransportConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config, clock })
    }

    /// Submits an encrypted message to its push service.
    ///
    /// Retries responses that classify as retryable (network failures,
    /// server errors, service-unavailable, rate limits) up to
    /// `max_retries` times with delays of `retry_delay * 2^attempt`.
    /// Client-side timeouts and cancellations are terminal immediately:
    /// the status table says timeouts are transient, but this transport
    /// never retries them.
    pub async fn send(&self, request: PushRequest, cancel: &CancellationToken) -> DeliveryResult {
        let span = info_span!(
            "push_delivery",
            endpoint = %request.endpoint,
            platform = %request.platform,
        );

        async move {
            let mut attempt: u32 = 0;
            loop {
                tracing::debug!(attempt, "submitting push message");

                let error = match self.attempt(&request, cancel).await {
                    Ok(status_code) => {
                        tracing::info!(status = status_code, attempt, "push message accepted");
                        return DeliveryResult::success(
                            request.platform,
                            &request.endpoint,
                            status_code,
                            self.clock.now_utc(),
                        );
                    },
                    Err(error) => error,
                };

                let terminal = !error.is_retryable() || attempt >= self.config.max_retries;
                if terminal {
                    tracing::warn!(
                        attempt,
                        error = %error,
                        status = %error.status(),
                        "push delivery failed"
                    );
                    return self.failure_result(&request, &error);
                }

                let delay = self.config.retry_delay * 2u32.saturating_pow(attempt.min(20));
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "retrying push delivery"
                );

                tokio::select! {
                    () = self.clock.sleep(delay) => {},
                    () = cancel.cancelled() => {
                        return self.failure_result(&request, &DeliveryError::Cancelled);
                    },
                }

                attempt += 1;
            }
        }
        .instrument(span)
        .await
    }

    /// Performs one HTTP exchange, returning the 2xx status code or a
    /// classified error.
    async fn attempt(&self, request: &PushRequest, cancel: &CancellationToken) -> Result<u16> {
        let mut http_request = self
            .client
            .post(&request.endpoint)
            .header("content-type", "application/octet-stream")
            .header("content-encoding", "aes128gcm")
            .header(
                "authorization",
                authorization_header(&request.vapid_token, &request.vapid_public_key),
            )
            .header("ttl", request.ttl.to_string())
            .header("urgency", request.urgency.as_str())
            // Body is re-materialized from Bytes on every attempt.
            .body(request.ciphertext.clone());

        if let Some(topic) = &request.topic {
            http_request = http_request.header("topic", topic);
        }
        http_request = match request.platform {
            Platform::Apns => http_request
                .header("apns-push-type", "alert")
                .header("apns-priority", "10"),
            Platform::Wns => http_request
                .header("X-WNS-Type", "wns/raw")
                .header("X-WNS-RequestForStatus", "true"),
            _ => http_request,
        };

        let response = tokio::select! {
            result = http_request.send() => result.map_err(|e| {
                if e.is_timeout() {
                    DeliveryError::timeout(self.config.timeout.as_secs())
                } else if e.is_connect() {
                    DeliveryError::network(format!("connection failed: {e}"))
                } else {
                    DeliveryError::network(e.to_string())
                }
            })?,
            () = cancel.cancelled() => return Err(DeliveryError::Cancelled),
        };

        let status_code = response.status().as_u16();
        if response.status().is_success() {
            return Ok(status_code);
        }

        let body = read_error_body(response).await;
        Err(DeliveryError::http(status_code, body))
    }

    /// Builds the terminal failure result for a classified error.
    fn failure_result(&self, request: &PushRequest, error: &DeliveryError) -> DeliveryResult {
        let (http_status, message) = match error {
            DeliveryError::Http { status, body } if !body.is_empty() => {
                (Some(*status), format!("{error}: {body}"))
            },
            DeliveryError::Http { status, .. } => (Some(*status), error.to_string()),
            _ => (None, error.to_string()),
        };

        DeliveryResult::failure(
            error.status(),
            http_status,
            message,
            request.platform,
            &request.endpoint,
            self.clock.now_utc(),
        )
    }
}

/// Push services return short plain-text or JSON diagnostics; cap what gets
/// carried into result messages.
const MAX_ERROR_BODY_BYTES: usize = 1024;

async fn read_error_body(response: reqwest::Response) -> String {
    match response.bytes().await {
        Ok(bytes) if bytes.len() > MAX_ERROR_BODY_BYTES => {
            let truncated = String::from_utf8_lossy(&bytes[..MAX_ERROR_BODY_BYTES]);
            format!("{truncated}... (truncated)")
        },
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}
