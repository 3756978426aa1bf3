//! Store adapter trait

use async_trait::async_trait;

use crate::error::StoreError;
use crate::model::{Condition, Record, WriteOutcome};

/// Narrow interface over a conditionally-writable key-value store
///
/// Implementations must evaluate the condition and apply the write as one
/// atomic step with respect to concurrent callers on the same key. No
/// retries or backoff live at this layer.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Point lookup. `consistent` requests a strongly-consistent read where
    /// the backend distinguishes one.
    async fn read(&self, key: &str, consistent: bool) -> Result<Option<Record>, StoreError>;

    /// Write `record` at `key` iff `condition` holds against the current
    /// record (or its absence).
    async fn conditional_put(
        &self,
        key: &str,
        record: Record,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError>;

    /// Delete `key` iff `condition` holds against the current record.
    async fn conditional_delete(
        &self,
        key: &str,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError>;
}
