//! Domain models for the web push delivery pipeline.
//!
//! Defines push subscriptions, notification payloads, batches, delivery
//! results, the closed delivery status taxonomy, and push-service platform
//! detection. Payloads and batches are constructed by the caller, validated
//! once at the orchestration boundary, and consumed read-only by the
//! delivery pipeline.

use std::{collections::HashMap, fmt, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Default time-to-live for push messages: four weeks, in seconds.
pub const DEFAULT_TTL_SECONDS: u32 = 2_419_200;

/// Strongly-typed batch identifier.
///
/// Wraps a UUID to prevent mixing with other ID types. Batches are immutable
/// once created, and this ID follows them through delivery and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Uuid);

impl BatchId {
    /// Creates a new random batch ID.
    ///
    /// Uses UUID v4 for globally unique identifiers without coordination.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for BatchId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// A browser's push subscription, as handed out by the Push API.
///
/// Contains everything needed to deliver an encrypted message to one
/// recipient. Owned by the caller; in-flight delivery tasks reference it
/// through the batch rather than copying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Client ECDH public key: 65-byte uncompressed P-256 point, base64url.
    pub p256dh: String,
    /// Client auth secret: 16 bytes, base64url.
    pub auth: String,
}

impl PushSubscription {
    /// Creates a subscription from its three wire components.
    pub fn new(
        endpoint: impl Into<String>,
        p256dh: impl Into<String>,
        auth: impl Into<String>,
    ) -> Self {
        Self { endpoint: endpoint.into(), p256dh: p256dh.into(), auth: auth.into() }
    }
}

/// Message urgency per RFC 8030 section 5.3.
///
/// Controls whether the push service may delay delivery to preserve the
/// device battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    /// Deliver only when the device is on power and wifi.
    VeryLow,
    /// Deliver opportunistically.
    Low,
    /// Default delivery priority.
    #[default]
    Normal,
    /// Deliver immediately, e.g. for incoming calls.
    High,
}

impl Urgency {
    /// Header value for the `Urgency` request header.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A push notification payload plus its delivery attributes.
///
/// The display fields (title, body, icon, ...) are serialized into the
/// canonical JSON form that gets encrypted; `ttl`, `urgency` and `topic`
/// travel as HTTP headers and never enter the ciphertext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification title shown by the platform.
    pub title: String,

    /// Message body text.
    pub body: String,

    /// Icon URL or data URI.
    pub icon: Option<String>,

    /// Badge URL or data URI.
    pub badge: Option<String>,

    /// Large image URL or data URI.
    pub image: Option<String>,

    /// URL to open when the notification is activated.
    pub url: Option<String>,

    /// Tag for notification replacement on the client.
    pub tag: Option<String>,

    /// Suppress sound and vibration.
    pub silent: bool,

    /// Re-alert the user when a tagged notification is replaced.
    pub renotify: bool,

    /// Arbitrary key-value data forwarded to the service worker.
    pub data: Option<serde_json::Map<String, serde_json::Value>>,

    /// Time-to-live in seconds. Defaults to four weeks.
    pub ttl: u32,

    /// Delivery urgency hint for the push service.
    pub urgency: Urgency,

    /// Topic for message replacement on the push service.
    pub topic: Option<String>,
}

/// The service-worker-visible subset of a notification.
///
/// Field order here defines the canonical JSON byte layout that gets
/// encrypted; the receiving service worker contract depends on these exact
/// names. `None` fields are omitted.
#[derive(Serialize)]
struct WireNotification<'a> {
    title: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    badge: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    silent: bool,
    renotify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a serde_json::Map<String, serde_json::Value>>,
}

impl Notification {
    /// Creates a notification with the given title and body and default
    /// delivery attributes.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            icon: None,
            badge: None,
            image: None,
            url: None,
            tag: None,
            silent: false,
            renotify: false,
            data: None,
            ttl: DEFAULT_TTL_SECONDS,
            urgency: Urgency::Normal,
            topic: None,
        }
    }

    /// Serializes the notification into its canonical JSON form.
    ///
    /// This byte string is the exact encryption plaintext. Serialization is
    /// deterministic: fixed field order, `None` fields omitted, so repeated
    /// calls yield identical bytes.
    pub fn to_canonical_json(&self) -> Vec<u8> {
        let wire = WireNotification {
            title: &self.title,
            body: &self.body,
            icon: self.icon.as_deref(),
            badge: self.badge.as_deref(),
            image: self.image.as_deref(),
            url: self.url.as_deref(),
            tag: self.tag.as_deref(),
            silent: self.silent,
            renotify: self.renotify,
            data: self.data.as_ref(),
        };
        // Serialization of a string/bool/map-only struct cannot fail.
        serde_json::to_vec(&wire).unwrap_or_default()
    }

    /// Validates the payload before any delivery work is dispatched.
    pub fn validate(&self) -> Result<()> {
        if self.title.is_empty() {
            return Err(CoreError::invalid_notification("title must not be empty"));
        }
        if self.ttl == 0 {
            return Err(CoreError::invalid_notification("ttl must be positive"));
        }
        Ok(())
    }
}

/// One payload fanned out to a set of recipients.
///
/// Immutable after construction except for caller-supplied metadata.
#[derive(Debug, Clone)]
pub struct NotificationBatch {
    /// Unique identifier for this batch.
    pub id: BatchId,

    /// The payload delivered to every recipient in the batch.
    pub notification: Notification,

    /// Subscription targets receiving this payload.
    pub recipients: Vec<PushSubscription>,

    /// Caller-supplied metadata, not interpreted by the pipeline.
    pub metadata: HashMap<String, String>,

    /// When this batch was constructed.
    pub created_at: DateTime<Utc>,
}

impl NotificationBatch {
    /// Creates a batch fanning out one notification to the given recipients.
    pub fn new(notification: Notification, recipients: Vec<PushSubscription>) -> Self {
        Self {
            id: BatchId::new(),
            notification,
            recipients,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Validates the batch before any delivery work is dispatched.
    pub fn validate(&self) -> Result<()> {
        self.notification.validate()?;
        if self.recipients.is_empty() {
            return Err(CoreError::invalid_batch("batch has no recipients"));
        }
        Ok(())
    }
}

/// Closed delivery status taxonomy shared by every pipeline component.
///
/// Callers branch on this single enum for partial-failure handling instead
/// of inspecting error strings or raw HTTP codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// The push service accepted the message.
    Success,
    /// Subscription material was malformed (bad keys, bad endpoint).
    InvalidSubscription,
    /// The subscription no longer exists at the push service (404/410).
    Expired,
    /// Connection-level failure before an HTTP response was received.
    NetworkError,
    /// The push service rejected the VAPID credentials (401/403).
    Unauthorized,
    /// The push service is throttling this sender (429).
    RateLimited,
    /// The encrypted body exceeds the service's size limit (413).
    PayloadTooLarge,
    /// Push service internal error (500/502/504).
    ServerError,
    /// The request itself was malformed (400).
    BadRequest,
    /// The push service is temporarily unavailable (503).
    ServiceUnavailable,
    /// Client-side timeout or cancellation during the exchange.
    Timeout,
    /// Message encryption or token signing failed.
    EncryptionFailed,
    /// Unexpected internal failure in the pipeline.
    InternalError,
    /// Response status with no defined mapping.
    Unknown,
}

impl DeliveryStatus {
    /// Maps an HTTP response status code into the taxonomy.
    ///
    /// The mapping is total: every possible code lands on exactly one
    /// variant.
    pub const fn from_http_status(code: u16) -> Self {
        match code {
            200..=299 => Self::Success,
            400 => Self::BadRequest,
            401 | 403 => Self::Unauthorized,
            404 | 410 => Self::Expired,
            413 => Self::PayloadTooLarge,
            429 => Self::RateLimited,
            500 | 502 | 504 => Self::ServerError,
            503 => Self::ServiceUnavailable,
            _ => Self::Unknown,
        }
    }

    /// Whether the transport may retry a delivery that produced this status.
    ///
    /// `Timeout` is deliberately absent: client-side timeouts are terminal
    /// even though they describe a transient condition.
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::ServerError | Self::ServiceUnavailable | Self::RateLimited
        )
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::InvalidSubscription => "invalid_subscription",
            Self::Expired => "expired",
            Self::NetworkError => "network_error",
            Self::Unauthorized => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::PayloadTooLarge => "payload_too_large",
            Self::ServerError => "server_error",
            Self::BadRequest => "bad_request",
            Self::ServiceUnavailable => "service_unavailable",
            Self::Timeout => "timeout",
            Self::EncryptionFailed => "encryption_failed",
            Self::InternalError => "internal_error",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Push service platform behind a subscription endpoint.
///
/// Determines platform-specific request headers; everything unrecognized is
/// treated as a generic RFC 8030 service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    /// Firebase Cloud Messaging (Chrome, Edge, Android browsers).
    Fcm,
    /// Apple Push Notification service (Safari).
    Apns,
    /// Mozilla autopush (Firefox).
    Mozilla,
    /// Windows Notification Service.
    Wns,
    /// Huawei Push Kit.
    Huawei,
    /// Any other RFC 8030 compliant push service.
    Generic,
}

/// Known push service domains, checked in order; first match wins.
const PLATFORM_DOMAINS: &[(&str, Platform)] = &[
    ("fcm.googleapis.com", Platform::Fcm),
    ("android.googleapis.com", Platform::Fcm),
    ("push.apple.com", Platform::Apns),
    ("push.services.mozilla.com", Platform::Mozilla),
    ("notify.windows.com", Platform::Wns),
    ("wns.windows.com", Platform::Wns),
    ("cloud.huawei.com", Platform::Huawei),
    ("hicloud.com", Platform::Huawei),
];

impl Platform {
    /// Detects the platform from a subscription endpoint.
    ///
    /// Case-insensitive substring match against known push service domains.
    pub fn detect(endpoint: &str) -> Self {
        let endpoint = endpoint.to_ascii_lowercase();
        for (domain, platform) in PLATFORM_DOMAINS {
            if endpoint.contains(domain) {
                return *platform;
            }
        }
        Self::Generic
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fcm => "fcm",
            Self::Apns => "apns",
            Self::Mozilla => "mozilla",
            Self::Wns => "wns",
            Self::Huawei => "huawei",
            Self::Generic => "generic",
        };
        f.write_str(s)
    }
}

/// Outcome of one delivery attempt chain for one recipient.
///
/// Produced for every recipient regardless of which pipeline stage failed.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    /// Whether the push service accepted the message.
    pub success: bool,

    /// Classified outcome from the shared taxonomy.
    pub status: DeliveryStatus,

    /// HTTP status code, when an HTTP exchange completed.
    pub http_status: Option<u16>,

    /// Human-readable failure description, including any response body text.
    pub message: Option<String>,

    /// Push service platform detected from the endpoint.
    pub platform: Platform,

    /// The recipient's endpoint URL.
    pub endpoint: String,

    /// When the outcome was recorded.
    pub timestamp: DateTime<Utc>,
}

impl DeliveryResult {
    /// Creates a successful delivery result.
    pub fn success(
        platform: Platform,
        endpoint: impl Into<String>,
        http_status: u16,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            success: true,
            status: DeliveryStatus::Success,
            http_status: Some(http_status),
            message: None,
            platform,
            endpoint: endpoint.into(),
            timestamp,
        }
    }

    /// Creates a failed delivery result.
    pub fn failure(
        status: DeliveryStatus,
        http_status: Option<u16>,
        message: impl Into<String>,
        platform: Platform,
        endpoint: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            success: false,
            status,
            http_status,
            message: Some(message.into()),
            platform,
            endpoint: endpoint.into(),
            timestamp,
        }
    }
}

/// Aggregated outcome of one batch.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// The batch these results belong to.
    pub batch_id: BatchId,

    /// One result per recipient, in dispatch completion order.
    pub results: Vec<DeliveryResult>,
}

impl BatchResult {
    /// A batch succeeds when at least one delivery succeeded.
    ///
    /// Callers needing all-or-nothing semantics must inspect the individual
    /// results.
    pub fn success(&self) -> bool {
        self.results.iter().any(|r| r.success)
    }

    /// Number of successful deliveries in this batch.
    pub fn successful_deliveries(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    /// Number of failed deliveries in this batch.
    pub fn failed_deliveries(&self) -> usize {
        self.results.iter().filter(|r| !r.success).count()
    }
}

/// Overall outcome of a `send_batches` call.
#[derive(Debug, Clone)]
pub struct SendReport {
    /// True when at least one delivery succeeded across all batches.
    pub success: bool,

    /// Terminal diagnostic, e.g. the canonical cancellation message.
    pub message: Option<String>,

    /// Per-batch results for partial-failure handling.
    pub batches: Vec<BatchResult>,

    /// Successful deliveries across all batches.
    pub successful_deliveries: usize,

    /// Failed deliveries across all batches.
    pub failed_deliveries: usize,

    /// Wall-clock time for the whole call.
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_ids_are_unique() {
        assert_ne!(BatchId::new(), BatchId::new());
    }

    #[test]
    fn canonical_json_is_stable_and_ordered() {
        let mut notification = Notification::new("Build failed", "main is red");
        notification.icon = Some("https://ci.example.com/icon.png".to_string());

        let bytes = notification.to_canonical_json();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            r#"{"title":"Build failed","body":"main is red","icon":"https://ci.example.com/icon.png","silent":false,"renotify":false}"#
        );
        // Repeated serialization yields identical bytes.
        assert_eq!(bytes, notification.to_canonical_json());
    }

    #[test]
    fn canonical_json_omits_absent_fields() {
        let notification = Notification::new("t", "b");
        let json: serde_json::Value =
            serde_json::from_slice(&notification.to_canonical_json()).unwrap();
        let object = json.as_object().unwrap();

        assert!(!object.contains_key("icon"));
        assert!(!object.contains_key("data"));
        assert!(object.contains_key("silent"));
        assert!(object.contains_key("renotify"));
    }

    #[test]
    fn canonical_json_carries_custom_data() {
        let mut data = serde_json::Map::new();
        data.insert("kind".to_string(), serde_json::json!("deploy"));
        let mut notification = Notification::new("t", "b");
        notification.data = Some(data);

        let json: serde_json::Value =
            serde_json::from_slice(&notification.to_canonical_json()).unwrap();
        assert_eq!(json["data"]["kind"], "deploy");
    }

    #[test]
    fn notification_defaults_match_web_push_conventions() {
        let notification = Notification::new("t", "b");
        assert_eq!(notification.ttl, 2_419_200);
        assert_eq!(notification.urgency, Urgency::Normal);
        assert!(!notification.silent);
    }

    #[test]
    fn validation_rejects_empty_title_and_zero_ttl() {
        let mut notification = Notification::new("", "b");
        assert!(notification.validate().is_err());

        notification.title = "t".to_string();
        notification.ttl = 0;
        assert!(notification.validate().is_err());
    }

    #[test]
    fn batch_without_recipients_is_rejected() {
        let batch = NotificationBatch::new(Notification::new("t", "b"), Vec::new());
        assert!(batch.validate().is_err());
    }

    #[test]
    fn status_mapping_is_exact() {
        use DeliveryStatus::*;
        let table = [
            (400, BadRequest),
            (401, Unauthorized),
            (403, Unauthorized),
            (404, Expired),
            (410, Expired),
            (413, PayloadTooLarge),
            (429, RateLimited),
            (500, ServerError),
            (502, ServerError),
            (504, ServerError),
            (503, ServiceUnavailable),
        ];
        for (code, expected) in table {
            assert_eq!(DeliveryStatus::from_http_status(code), expected, "code {code}");
        }
        assert_eq!(DeliveryStatus::from_http_status(201), Success);
        assert_eq!(DeliveryStatus::from_http_status(418), Unknown);
    }

    #[test]
    fn retryable_statuses_exclude_timeout() {
        assert!(DeliveryStatus::NetworkError.is_retryable());
        assert!(DeliveryStatus::ServerError.is_retryable());
        assert!(DeliveryStatus::ServiceUnavailable.is_retryable());
        assert!(DeliveryStatus::RateLimited.is_retryable());

        assert!(!DeliveryStatus::Timeout.is_retryable());
        assert!(!DeliveryStatus::Expired.is_retryable());
        assert!(!DeliveryStatus::BadRequest.is_retryable());
        assert!(!DeliveryStatus::Unauthorized.is_retryable());
    }

    #[test]
    fn platform_detection_matches_known_domains() {
        assert_eq!(
            Platform::detect("https://fcm.googleapis.com/fcm/send/abc123"),
            Platform::Fcm
        );
        assert_eq!(
            Platform::detect("https://web.push.apple.com/QOXx8D0AAAA"),
            Platform::Apns
        );
        assert_eq!(
            Platform::detect("https://updates.push.services.mozilla.com/wpush/v2/x"),
            Platform::Mozilla
        );
        assert_eq!(
            Platform::detect("https://db5p.notify.windows.com/w/?token=x"),
            Platform::Wns
        );
        assert_eq!(Platform::detect("https://push-api.cloud.huawei.com/v1/x"), Platform::Huawei);
        assert_eq!(Platform::detect("https://push.example.org/v1/x"), Platform::Generic);
    }

    #[test]
    fn platform_detection_is_case_insensitive() {
        assert_eq!(Platform::detect("https://FCM.GOOGLEAPIS.COM/fcm/send/x"), Platform::Fcm);
    }

    #[test]
    fn batch_result_success_means_at_least_one() {
        let batch_id = BatchId::new();
        let now = Utc::now();
        let result = BatchResult {
            batch_id,
            results: vec![
                DeliveryResult::success(Platform::Generic, "https://push.example.org/a", 201, now),
                DeliveryResult::failure(
                    DeliveryStatus::Expired,
                    Some(410),
                    "gone",
                    Platform::Generic,
                    "https://push.example.org/b",
                    now,
                ),
            ],
        };

        assert!(result.success());
        assert_eq!(result.successful_deliveries(), 1);
        assert_eq!(result.failed_deliveries(), 1);
    }

    #[test]
    fn urgency_header_values() {
        assert_eq!(Urgency::VeryLow.as_str(), "very-low");
        assert_eq!(Urgency::Low.as_str(), "low");
        assert_eq!(Urgency::Normal.as_str(), "normal");
        assert_eq!(Urgency::High.as_str(), "high");
    }
}
