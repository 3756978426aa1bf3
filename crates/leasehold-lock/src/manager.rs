//! Lease Lock Manager
//!
//! Provides:
//! - Lease acquisition through one conditional write (absent, re-entrant, or
//!   takeover of an expired lease)
//! - Fencing-token checked extension and release
//! - Bounded or unbounded retrying acquisition
//! - Scoped acquisition that always releases
//!
//! The manager keeps no coordination state of its own. Everything that
//! decides ownership is a conditional write against the store.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use leasehold_common::{Clock, Sleeper, SystemClock, TokioSleeper};
use leasehold_store::{Condition, KvStore, WriteOutcome};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::ValueCache;
use crate::codec::{EXPIRY_FIELD, KeyLayout, LeaseRecord, OWNER_FIELD, TOKEN_FIELD};
use crate::config::LockManagerConfig;
use crate::error::LockError;
use crate::handle::LeaseHandle;
use crate::metrics;

/// Retry policy for `acquire_with_retry` and `with_lease`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Lease lifetime in seconds; the manager default when unset
    pub ttl: Option<u64>,
    /// Attempts before giving up; unset waits indefinitely
    pub max_attempts: Option<u32>,
    /// Pause between attempts
    pub retry_interval: Duration,
}

impl Default for AcquireOptions {
    /// A single attempt with the manager's default TTL
    fn default() -> Self {
        Self {
            ttl: None,
            max_attempts: Some(1),
            retry_interval: Duration::from_secs(1),
        }
    }
}

impl AcquireOptions {
    /// Retry until the lease is acquired
    pub fn wait_forever(retry_interval: Duration) -> Self {
        Self {
            ttl: None,
            max_attempts: None,
            retry_interval,
        }
    }

    pub fn with_ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}

struct ManagerInner {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    layout: KeyLayout,
    worker_id: String,
    config: LockManagerConfig,
}

/// Distributed lease lock over a conditional key-value store
///
/// Cloning is cheap and every clone shares one worker id, so all clones
/// count as the same owner.
#[derive(Clone)]
pub struct LockManager {
    inner: Arc<ManagerInner>,
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("namespace", &self.inner.layout.namespace())
            .field("worker_id", &self.inner.worker_id)
            .finish()
    }
}

/// Builder for `LockManager`
pub struct LockManagerBuilder {
    store: Arc<dyn KvStore>,
    config: LockManagerConfig,
    clock: Option<Arc<dyn Clock>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl LockManagerBuilder {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self {
            store,
            config: LockManagerConfig::default(),
            clock: None,
            sleeper: None,
        }
    }

    pub fn config(mut self, config: LockManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn build(self) -> Result<LockManager, LockError> {
        self.config.validate()?;

        let worker_id = self
            .config
            .worker_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let layout = KeyLayout::new(self.config.namespace.clone());

        info!(
            namespace = %layout.namespace(),
            worker_id = %worker_id,
            "LockManager initialized"
        );

        Ok(LockManager {
            inner: Arc::new(ManagerInner {
                store: self.store,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper)),
                layout,
                worker_id,
                config: self.config,
            }),
        })
    }
}

impl LockManager {
    /// Create a manager on the system clock and tokio timer
    pub fn new(store: Arc<dyn KvStore>, config: LockManagerConfig) -> Result<Self, LockError> {
        Self::builder(store).config(config).build()
    }

    pub fn builder(store: Arc<dyn KvStore>) -> LockManagerBuilder {
        LockManagerBuilder::new(store)
    }

    pub fn worker_id(&self) -> &str {
        &self.inner.worker_id
    }

    pub fn namespace(&self) -> &str {
        self.inner.layout.namespace()
    }

    pub fn config(&self) -> &LockManagerConfig {
        &self.inner.config
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.inner.layout
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.inner.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    /// Value cache sharing this manager's store, namespace and clock
    pub fn value_cache(&self) -> ValueCache {
        ValueCache::new(
            self.inner.store.clone(),
            self.inner.clock.clone(),
            self.inner.layout.clone(),
            &self.inner.config,
        )
    }

    fn expiry_from(&self, now: i64, ttl: Option<u64>) -> i64 {
        let ttl = ttl.unwrap_or(self.inner.config.lock_default_ttl_secs);
        now.saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX))
    }

    /// Try once to acquire the lease on `key`
    ///
    /// Succeeds when no lease exists, when this manager's worker already
    /// owns it (re-entrant refresh), or when the current lease has expired.
    /// Every success issues a fresh fencing token, invalidating any handle
    /// from an earlier acquisition.
    pub async fn acquire(&self, key: &str, ttl: Option<u64>) -> Result<LeaseHandle, LockError> {
        let now = self.inner.clock.now();
        let lease = LeaseRecord {
            owner: self.inner.worker_id.clone(),
            token: Uuid::new_v4().to_string(),
            expiry: self.expiry_from(now, ttl),
        };
        let condition = Condition::Or(vec![
            Condition::NotExists,
            Condition::field_equals(OWNER_FIELD, self.inner.worker_id.as_str()),
            Condition::field_at_most(EXPIRY_FIELD, now),
        ]);

        let lease_key = self.inner.layout.lease_key(key);
        match self
            .inner
            .store
            .conditional_put(&lease_key, lease.to_record(), condition)
            .await?
        {
            WriteOutcome::Applied => {
                metrics::record_acquire(true);
                info!(key = %key, token = %lease.token, expiry = lease.expiry, "Lease acquired");
                Ok(LeaseHandle::new(self.clone(), key, lease.token))
            }
            WriteOutcome::ConditionFailed => {
                metrics::record_acquire(false);
                debug!(key = %key, "Lease held by another owner");
                Err(LockError::Acquisition {
                    key: key.to_string(),
                })
            }
        }
    }

    /// Acquire, retrying on contention
    ///
    /// Sleeps `retry_interval` between attempts. With `max_attempts` unset
    /// this waits indefinitely; otherwise the last `Acquisition` error is
    /// returned unchanged. Store errors are never retried. A bound of zero
    /// still makes one attempt.
    pub async fn acquire_with_retry(
        &self,
        key: &str,
        options: &AcquireOptions,
    ) -> Result<LeaseHandle, LockError> {
        let max_attempts = options.max_attempts.map(|max| max.max(1));
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);
            match self.acquire(key, options.ttl).await {
                Err(err) if err.is_contention() => {
                    if max_attempts.is_some_and(|max| attempt >= max) {
                        debug!(key = %key, attempts = attempt, "Giving up on lease");
                        return Err(err);
                    }
                    let retry_in_ms =
                        u64::try_from(options.retry_interval.as_millis()).unwrap_or(u64::MAX);
                    debug!(key = %key, attempt, retry_in_ms, "Lease contended, retrying");
                    self.inner.sleeper.sleep(options.retry_interval).await;
                }
                result => return result,
            }
        }
    }

    /// Run `body` while holding the lease on `key`
    ///
    /// The lease is released exactly once after `body` finishes, whether it
    /// returns `Ok`, returns `Err`, or panics (the panic is resumed after the
    /// release). A failed release is logged and never replaces the body's
    /// outcome.
    pub async fn with_lease<T, E, F, Fut>(
        &self,
        key: &str,
        options: &AcquireOptions,
        body: F,
    ) -> Result<T, E>
    where
        F: FnOnce(LeaseHandle) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let handle = self.acquire_with_retry(key, options).await?;

        let body_handle = handle.clone();
        let outcome = AssertUnwindSafe(async move { body(body_handle).await })
            .catch_unwind()
            .await;

        match self.release(&handle).await {
            Ok(true) => {}
            Ok(false) => warn!(key = %key, "Lease was no longer held when the scoped body finished"),
            Err(err) => warn!(key = %key, error = %err, "Failed to release lease after scoped body"),
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    /// Push the lease's expiry to `now + ttl`
    ///
    /// Requires both this worker's id and the handle's token to still be on
    /// the record. Any mismatch means the lease was lost and surfaces as
    /// `LockError::Extend`; it is never retried here.
    pub async fn extend(&self, handle: &LeaseHandle, ttl: Option<u64>) -> Result<(), LockError> {
        let now = self.inner.clock.now();
        let lease = LeaseRecord {
            owner: self.inner.worker_id.clone(),
            token: handle.token().to_string(),
            expiry: self.expiry_from(now, ttl),
        };
        let condition = Condition::And(vec![
            Condition::field_equals(OWNER_FIELD, self.inner.worker_id.as_str()),
            Condition::field_equals(TOKEN_FIELD, handle.token()),
        ]);

        let lease_key = self.inner.layout.lease_key(handle.key());
        match self
            .inner
            .store
            .conditional_put(&lease_key, lease.to_record(), condition)
            .await?
        {
            WriteOutcome::Applied => {
                metrics::record_extend(true);
                debug!(key = %handle.key(), expiry = lease.expiry, "Lease extended");
                Ok(())
            }
            WriteOutcome::ConditionFailed => {
                metrics::record_extend(false);
                warn!(key = %handle.key(), token = %handle.token(), "Lease lost, extend rejected");
                Err(LockError::Extend {
                    key: handle.key().to_string(),
                    token: handle.token().to_string(),
                })
            }
        }
    }

    /// Delete the lease if it still carries the handle's token
    ///
    /// Returns `Ok(false)` when the lease was already taken over or is gone:
    /// the current holder's record is left untouched.
    pub async fn release(&self, handle: &LeaseHandle) -> Result<bool, LockError> {
        let lease_key = self.inner.layout.lease_key(handle.key());
        let outcome = self
            .inner
            .store
            .conditional_delete(&lease_key, Condition::field_equals(TOKEN_FIELD, handle.token()))
            .await?;

        let released = outcome.is_applied();
        metrics::record_release(released);
        if released {
            info!(key = %handle.key(), token = %handle.token(), "Lease released");
        } else {
            debug!(key = %handle.key(), token = %handle.token(), "Lease not held, nothing released");
        }
        Ok(released)
    }

    /// Current lease record for `key`, expired or not
    pub async fn lease_info(&self, key: &str) -> Result<Option<LeaseRecord>, LockError> {
        let lease_key = self.inner.layout.lease_key(key);
        let Some(record) = self
            .inner
            .store
            .read(&lease_key, self.inner.config.consistent_reads)
            .await?
        else {
            return Ok(None);
        };

        LeaseRecord::from_record(record)
            .map(Some)
            .map_err(|e| LockError::Malformed {
                key: lease_key,
                reason: e.to_string(),
            })
    }

    /// Whether any owner holds an unexpired lease on `key`
    pub async fn is_locked(&self, key: &str) -> Result<bool, LockError> {
        let now = self.inner.clock.now();
        Ok(self
            .lease_info(key)
            .await?
            .is_some_and(|lease| lease.is_valid_at(now)))
    }

    /// Rebuild a handle from a token kept outside this process
    ///
    /// Nothing is checked here; the store proves ownership on extend and
    /// release.
    pub fn resume(&self, key: impl Into<String>, token: impl Into<String>) -> LeaseHandle {
        LeaseHandle::new(self.clone(), key, token)
    }
}
