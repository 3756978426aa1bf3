//! TTL value cache stored next to the leases
//!
//! Expiry is only enforced when reading; expired entries stay in the store
//! until overwritten or reaped by the backend.

use std::sync::Arc;

use leasehold_common::Clock;
use leasehold_store::{Condition, KvStore};
use serde_json::Value;
use tracing::debug;

use crate::codec::{CachedValue, KeyLayout};
use crate::config::LockManagerConfig;
use crate::error::LockError;
use crate::metrics;

/// TTL-tagged key/value storage sharing the lock manager's store
#[derive(Clone)]
pub struct ValueCache {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    layout: KeyLayout,
    default_ttl_secs: u64,
    consistent_reads: bool,
}

impl ValueCache {
    pub fn new(
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
        layout: KeyLayout,
        config: &LockManagerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            layout,
            default_ttl_secs: config.value_default_ttl_secs,
            consistent_reads: config.consistent_reads,
        }
    }

    /// Write `value` unconditionally with expiry `now + ttl`
    pub async fn store(&self, key: &str, value: Value, ttl: Option<u64>) -> Result<(), LockError> {
        let ttl = ttl.unwrap_or(self.default_ttl_secs);
        let entry = CachedValue {
            value,
            expiry: self
                .clock
                .now()
                .saturating_add(i64::try_from(ttl).unwrap_or(i64::MAX)),
        };

        let value_key = self.layout.value_key(key);
        self.store
            .conditional_put(&value_key, entry.to_record(), Condition::Always)
            .await?;
        debug!(key = %key, expiry = entry.expiry, "Value stored");
        Ok(())
    }

    /// Read the value at `key`
    ///
    /// Returns `default` when nothing is stored, when the stored entry
    /// cannot be decoded, or when it has expired and `ignore_ttl` is false.
    pub async fn fetch(
        &self,
        key: &str,
        default: Option<Value>,
        ignore_ttl: bool,
    ) -> Result<Option<Value>, LockError> {
        let value_key = self.layout.value_key(key);
        let Some(record) = self.store.read(&value_key, self.consistent_reads).await? else {
            metrics::record_cache_fetch("miss");
            return Ok(default);
        };

        let entry = match CachedValue::from_record(record) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(key = %value_key, error = %e, "Ignoring malformed cached value");
                metrics::record_cache_fetch("miss");
                return Ok(default);
            }
        };

        if !ignore_ttl && entry.is_expired_at(self.clock.now()) {
            metrics::record_cache_fetch("expired");
            return Ok(default);
        }

        metrics::record_cache_fetch("hit");
        Ok(Some(entry.value))
    }
}
