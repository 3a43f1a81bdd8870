//! Batch delivery orchestration with bounded parallelism.
//!
//! The engine is the single entry point into the pipeline: construct it
//! once with a VAPID key pair, then call [`PushEngine::send_batches`] for
//! every fan-out. Per call, batches run under a semaphore bounded by
//! `max_parallelism` while every recipient of a running batch is dispatched
//! at once; the two limits are independent so large recipient lists never
//! starve batch-level parallelism.
//!
//! Every recipient yields exactly one [`DeliveryResult`] no matter which
//! stage failed; subcomponent errors are classified into the shared status
//! taxonomy instead of propagating.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use bytes::Bytes;
use fanfare_core::{
    keys::VapidKeys,
    models::{BatchResult, DeliveryResult, DeliveryStatus, NotificationBatch, Platform, SendReport},
    time::{Clock, SystemClock},
};
use fanfare_crypto::{ece, VapidSigner};
use tokio::{
    sync::{Mutex, Semaphore},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    client::{PushClient, PushRequest, TransportConfig},
    error::{DeliveryError, Result},
};

/// Message used for reports terminated by cancellation.
const CANCELLED_MESSAGE: &str = "operation cancelled";

/// Configuration for the delivery engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of batches processed concurrently.
    pub max_parallelism: usize,

    /// Whether to keep launching batches after a batch contains a failed
    /// delivery.
    ///
    /// When false, the stop is best-effort: batches already in flight when
    /// a failure is observed run to completion, and a batch may still start
    /// if it wins the race against the failure being recorded.
    pub continue_on_error: bool,

    /// HTTP transport configuration.
    pub transport: TransportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_parallelism: crate::DEFAULT_MAX_PARALLELISM,
            continue_on_error: true,
            transport: TransportConfig::default(),
        }
    }
}

/// Delivery engine coordinating encryption, signing, and transport.
///
/// The configure-once handle for the pipeline: holds the validated VAPID
/// key pair and the pooled HTTP client, both reused across every
/// `send_batches` call. No other state persists between calls.
pub struct PushEngine {
    client: Arc<PushClient>,
    signer: Arc<VapidSigner>,
    config: EngineConfig,
    clock: Arc<dyn Clock>,
}

impl PushEngine {
    /// Creates an engine from a VAPID key pair and configuration.
    ///
    /// Validates the key pair once here so per-recipient work never fails
    /// on sender-side key material.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Crypto` for a malformed key pair and
    /// `DeliveryError::Configuration` for unusable settings.
    pub fn new(keys: &VapidKeys, config: EngineConfig) -> Result<Self> {
        Self::with_clock(keys, config, Arc::new(SystemClock))
    }

    /// Creates an engine with an injected clock for deterministic tests.
    pub fn with_clock(
        keys: &VapidKeys,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.max_parallelism == 0 {
            return Err(DeliveryError::configuration("max_parallelism must be at least 1"));
        }

        let signer = Arc::new(VapidSigner::with_clock(keys, clock.clone())?);
        let client = Arc::new(PushClient::with_clock(config.transport.clone(), clock.clone())?);

        Ok(Self { client, signer, config, clock })
    }

    /// Public key advertised to push services, for subscription setup.
    pub fn public_key(&self) -> &str {
        self.signer.public_key()
    }

    /// Delivers every batch to every recipient and aggregates the results.
    ///
    /// Batches are validated up front; the payload of each batch is
    /// serialized exactly once and shared by its recipient tasks. The call
    /// never panics outward: cancellations and internal faults degrade to a
    /// failure report carrying a message.
    pub async fn send_batches(
        &self,
        batches: Vec<NotificationBatch>,
        cancel: CancellationToken,
    ) -> SendReport {
        let started = self.clock.now();
        let total = batches.len();

        for batch in &batches {
            if let Err(validation) = batch.validate() {
                warn!(batch_id = %batch.id, error = %validation, "rejecting invalid batch");
                return SendReport {
                    success: false,
                    message: Some(validation.to_string()),
                    batches: Vec::new(),
                    successful_deliveries: 0,
                    failed_deliveries: 0,
                    elapsed: self.clock.now().duration_since(started),
                };
            }
        }

        info!(batch_count = total, max_parallelism = self.config.max_parallelism, "sending batches");

        let semaphore = Arc::new(Semaphore::new(self.config.max_parallelism));
        let collected: Arc<Mutex<Vec<BatchResult>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let completed = Arc::new(AtomicUsize::new(0));
        let failure_seen = Arc::new(AtomicBool::new(false));
        let continue_on_error = self.config.continue_on_error;

        let mut tasks = JoinSet::new();
        for batch in batches {
            let semaphore = semaphore.clone();
            let collected = collected.clone();
            let completed = completed.clone();
            let failure_seen = failure_seen.clone();
            let cancel = cancel.clone();
            let client = self.client.clone();
            let signer = self.signer.clone();
            let clock = self.clock.clone();

            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return;
                };
                if cancel.is_cancelled() {
                    return;
                }
                // Best-effort stop: a batch that slips past this check while
                // the first failure is being recorded still runs.
                if !continue_on_error && failure_seen.load(Ordering::Acquire) {
                    debug!(batch_id = %batch.id, "skipping batch after earlier failure");
                    return;
                }

                let result = run_batch(client, signer, clock, batch, cancel).await;

                if result.failed_deliveries() > 0 {
                    failure_seen.store(true, Ordering::Release);
                }
                let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
                debug!(
                    completed = done,
                    total,
                    batch_id = %result.batch_id,
                    successful = result.successful_deliveries(),
                    failed = result.failed_deliveries(),
                    "batch completed"
                );
                collected.lock().await.push(result);
            });
        }

        let mut internal_fault: Option<String> = None;
        while let Some(joined) = tasks.join_next().await {
            if let Err(join_error) = joined {
                error!(error = %join_error, "batch task failed");
                internal_fault.get_or_insert_with(|| format!("batch task failed: {join_error}"));
            }
        }

        let batch_results = {
            let mut guard = collected.lock().await;
            std::mem::take(&mut *guard)
        };
        let successful_deliveries: usize =
            batch_results.iter().map(BatchResult::successful_deliveries).sum();
        let failed_deliveries: usize =
            batch_results.iter().map(BatchResult::failed_deliveries).sum();

        let cancelled = cancel.is_cancelled();
        let message = if cancelled {
            Some(CANCELLED_MESSAGE.to_string())
        } else {
            internal_fault
        };
        // Cancellation is a terminal failure even when some deliveries
        // landed before the trigger; the completed results stay available.
        let success = successful_deliveries > 0 && !cancelled;

        let report = SendReport {
            success,
            message,
            batches: batch_results,
            successful_deliveries,
            failed_deliveries,
            elapsed: self.clock.now().duration_since(started),
        };

        info!(
            success = report.success,
            successful = report.successful_deliveries,
            failed = report.failed_deliveries,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "send completed"
        );

        report
    }
}

/// Delivers one batch: serialize once, fan out to every recipient at once.
async fn run_batch(
    client: Arc<PushClient>,
    signer: Arc<VapidSigner>,
    clock: Arc<dyn Clock>,
    batch: NotificationBatch,
    cancel: CancellationToken,
) -> BatchResult {
    let payload = Bytes::from(batch.notification.to_canonical_json());
    let batch = Arc::new(batch);
    let recipient_count = batch.recipients.len();

    let mut tasks = JoinSet::new();
    for index in 0..recipient_count {
        tasks.spawn(deliver_to_recipient(
            client.clone(),
            signer.clone(),
            clock.clone(),
            batch.clone(),
            index,
            payload.clone(),
            cancel.clone(),
        ));
    }

    let mut results = Vec::with_capacity(recipient_count);
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(join_error) => {
                error!(batch_id = %batch.id, error = %join_error, "recipient task failed");
                results.push(DeliveryResult::failure(
                    DeliveryStatus::InternalError,
                    None,
                    format!("recipient task failed: {join_error}"),
                    Platform::Generic,
                    String::new(),
                    clock.now_utc(),
                ));
            },
        }
    }

    BatchResult { batch_id: batch.id, results }
}

/// Runs the full per-recipient pipeline: audience resolution, encryption,
/// token signing, transport. Always returns a result, never an error.
async fn deliver_to_recipient(
    client: Arc<PushClient>,
    signer: Arc<VapidSigner>,
    clock: Arc<dyn Clock>,
    batch: Arc<NotificationBatch>,
    index: usize,
    payload: Bytes,
    cancel: CancellationToken,
) -> DeliveryResult {
    let recipient = &batch.recipients[index];
    let platform = Platform::detect(&recipient.endpoint);

    match prepare_request(&signer, &batch, index, platform, &payload) {
        Ok(request) => client.send(request, &cancel).await,
        Err(error) => {
            warn!(
                endpoint = %recipient.endpoint,
                error = %error,
                status = %error.status(),
                "recipient preparation failed"
            );
            DeliveryResult::failure(
                error.status(),
                None,
                error.to_string(),
                platform,
                &recipient.endpoint,
                clock.now_utc(),
            )
        },
    }
}

/// Encrypts the payload for one recipient and mints an origin-scoped token.
fn prepare_request(
    signer: &VapidSigner,
    batch: &NotificationBatch,
    index: usize,
    platform: Platform,
    payload: &Bytes,
) -> Result<PushRequest> {
    let recipient = &batch.recipients[index];
    let audience = audience_of(&recipient.endpoint)?;
    let ciphertext = ece::encrypt(&recipient.p256dh, &recipient.auth, payload)?;
    let token = signer.sign(&audience)?;

    Ok(PushRequest {
        endpoint: recipient.endpoint.clone(),
        ciphertext: Bytes::from(ciphertext),
        vapid_token: token,
        vapid_public_key: signer.public_key().to_string(),
        platform,
        ttl: batch.notification.ttl,
        urgency: batch.notification.urgency,
        topic: batch.notification.topic.clone(),
    })
}

/// Resolves a subscription endpoint into its VAPID audience: the
/// `scheme://host` origin the token's `aud` claim must carry.
pub fn audience_of(endpoint: &str) -> Result<String> {
    let url: reqwest::Url = endpoint
        .parse()
        .map_err(|e| DeliveryError::invalid_endpoint(format!("{e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| DeliveryError::invalid_endpoint("endpoint has no host"))?;
    Ok(format!("{}://{}", url.scheme(), host))
}
