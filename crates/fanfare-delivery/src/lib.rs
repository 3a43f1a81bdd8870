//! Push delivery engine with retry and bounded batch fan-out.
//!
//! This crate implements the delivery half of the web push pipeline: the
//! HTTP transport that submits encrypted messages to push services
//! (RFC 8030) and the orchestrator that fans batches out across recipients
//! with exponential backoff and per-recipient failure classification.
//!
//! # Architecture
//!
//! The engine is constructed once with a VAPID key pair and reused for
//! every send. Each call to [`PushEngine::send_batches`] runs the complete
//! delivery lifecycle:
//!
//! 1. **Validate** - Batches are checked once at the orchestration boundary
//! 2. **Serialize** - Each batch's payload becomes canonical JSON exactly once
//! 3. **Fan Out** - Batches run under a semaphore bounded by
//!    `max_parallelism`; all recipients of a running batch dispatch at once
//! 4. **Deliver** - Per recipient: platform detection, payload encryption,
//!    origin-scoped VAPID token, HTTP submission with retries
//! 5. **Aggregate** - One result per recipient rolls up into batch and
//!    overall reports
//!
//! The two concurrency limits are independent, so large recipient lists
//! never starve batch-level parallelism.
//!
//! # Example
//!
//! ```no_run
//! use fanfare_core::{Notification, NotificationBatch, PushSubscription, VapidKeys};
//! use fanfare_delivery::{DeliveryError, EngineConfig, PushEngine};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(
//! #     keys: VapidKeys,
//! #     subscription: PushSubscription,
//! # ) -> std::result::Result<(), DeliveryError> {
//! let engine = PushEngine::new(&keys, EngineConfig::default())?;
//!
//! let notification = Notification::new("Deploy finished", "v2.4.1 is live");
//! let batch = NotificationBatch::new(notification, vec![subscription]);
//!
//! let report = engine.send_batches(vec![batch], CancellationToken::new()).await;
//! for batch in &report.batches {
//!     println!("batch {}: {} delivered", batch.batch_id, batch.successful_deliveries());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod engine;
pub mod error;

pub use client::{PushClient, PushRequest, TransportConfig};
pub use engine::{audience_of, EngineConfig, PushEngine};
pub use error::{DeliveryError, Result};

/// Default HTTP request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Default number of retries after the initial delivery attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default number of concurrently processed batches.
pub const DEFAULT_MAX_PARALLELISM: usize = 4;
