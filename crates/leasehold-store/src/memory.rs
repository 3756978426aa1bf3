// In-memory store backend using DashMap
// Each conditional write holds the shard lock for its key while the condition
// is evaluated, so racing writers on one key are serialized.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

use crate::error::StoreError;
use crate::model::{Condition, Record, WriteOutcome};
use crate::traits::KvStore;

/// In-process store backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: DashMap<String, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn read(&self, key: &str, _consistent: bool) -> Result<Option<Record>, StoreError> {
        Ok(self.items.get(key).map(|entry| entry.value().clone()))
    }

    async fn conditional_put(
        &self,
        key: &str,
        record: Record,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError> {
        let outcome = match self.items.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if condition.matches(Some(entry.get())) {
                    entry.insert(record);
                    WriteOutcome::Applied
                } else {
                    WriteOutcome::ConditionFailed
                }
            }
            Entry::Vacant(entry) => {
                if condition.matches(None) {
                    entry.insert(record);
                    WriteOutcome::Applied
                } else {
                    WriteOutcome::ConditionFailed
                }
            }
        };

        trace!(key = %key, ?outcome, "memory conditional put");
        Ok(outcome)
    }

    async fn conditional_delete(
        &self,
        key: &str,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError> {
        let outcome = match self.items.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                if condition.matches(Some(entry.get())) {
                    entry.remove();
                    WriteOutcome::Applied
                } else {
                    WriteOutcome::ConditionFailed
                }
            }
            Entry::Vacant(_) => {
                if condition.matches(None) {
                    WriteOutcome::Applied
                } else {
                    WriteOutcome::ConditionFailed
                }
            }
        };

        trace!(key = %key, ?outcome, "memory conditional delete");
        Ok(outcome)
    }
}
