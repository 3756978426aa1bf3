// Time seams for lease arithmetic
// Leases carry absolute expiry timestamps in epoch seconds; every participant
// compares them against its own clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

/// Source of the current wall-clock time in epoch seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Move the clock forward by `secs` seconds, saturating at `i64::MAX`
    pub fn advance(&self, secs: i64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| {
                Some(now.saturating_add(secs))
            });
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Pause between retry attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that advances a `ManualClock` instead of waiting
///
/// Sub-second durations round up to a whole second so that a retry loop
/// always observes time moving forward.
#[derive(Debug)]
pub struct ManualSleeper {
    clock: Arc<ManualClock>,
    calls: AtomicU32,
}

impl ManualSleeper {
    pub fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            calls: AtomicU32::new(0),
        }
    }

    /// Number of times `sleep` has been called
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sleeper for ManualSleeper {
    async fn sleep(&self, duration: Duration) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let secs = duration.as_millis().div_ceil(1000);
        self.clock.advance(i64::try_from(secs).unwrap_or(i64::MAX));
        tokio::task::yield_now().await;
    }
}
