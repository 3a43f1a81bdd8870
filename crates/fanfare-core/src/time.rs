//! Time abstractions for testable timing operations.
//!
//! The signer stamps JWT expirations and the transport schedules retry
//! delays through this trait, so tests can control both without real
//! sleeps.

use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use chrono::{DateTime, TimeZone, Utc};

/// Clock abstraction for time operations.
///
/// Production code uses [`SystemClock`]; tests inject [`TestClock`] to make
/// token expirations and retry schedules deterministic.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current instant for duration measurements.
    fn now(&self) -> Instant;

    /// Current UTC time for timestamps.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Sleeps for the specified duration.
    ///
    /// Maps to `tokio::time::sleep` in production; test clocks advance
    /// virtual time immediately instead.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Seconds since the Unix epoch, for JWT claims.
    fn unix_timestamp(&self) -> u64 {
        self.now_utc().timestamp().max(0) as u64
    }
}

/// Real clock backed by system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a new system clock instance.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Test clock with controllable time progression.
///
/// Monotonic and UTC time advance together; `sleep` advances the clock and
/// yields instead of waiting, so retry schedules run instantly in tests.
#[derive(Debug, Clone)]
pub struct TestClock {
    /// UTC start time as milliseconds since the Unix epoch.
    start_millis: i64,
    /// Virtual milliseconds elapsed since the start.
    elapsed_millis: Arc<AtomicU64>,
    /// Base instant for monotonic time calculations.
    base_instant: Instant,
}

impl TestClock {
    /// Creates a test clock starting at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Creates a test clock starting at a specific UTC time.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start_millis: start.timestamp_millis(),
            elapsed_millis: Arc::new(AtomicU64::new(0)),
            base_instant: Instant::now(),
        }
    }

    /// Advances the clock by the specified duration.
    pub fn advance(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis().min(u128::from(u64::MAX))).unwrap_or(0);
        self.elapsed_millis.fetch_add(millis, Ordering::AcqRel);
    }

    /// Virtual time elapsed since clock creation.
    pub fn elapsed(&self) -> Duration {
        Duration::from_millis(self.elapsed_millis.load(Ordering::Acquire))
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        let millis = self
            .start_millis
            .saturating_add(i64::try_from(self.elapsed_millis.load(Ordering::Acquire)).unwrap_or(i64::MAX));
        Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now)
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        Box::pin(tokio::task::yield_now())
    }
}
