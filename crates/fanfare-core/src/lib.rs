//! Core domain models for encrypted web push delivery.
//!
//! Provides strongly-typed domain primitives, the shared delivery status
//! taxonomy, push-service platform detection, and VAPID key material. All
//! other crates depend on these foundational types for type safety and
//! consistency.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod keys;
pub mod models;
pub mod time;

pub use error::{CoreError, Result};
pub use keys::VapidKeys;
pub use models::{
    BatchId, BatchResult, DeliveryResult, DeliveryStatus, Notification, NotificationBatch,
    Platform, PushSubscription, SendReport, Urgency,
};
pub use time::{Clock, SystemClock, TestClock};
