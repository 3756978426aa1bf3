//! RocksDB access shared between CLI processes
//!
//! RocksDB lets a single process open a database at a time. Every store call
//! opens the database, runs, and closes it again, so concurrent `leasehold`
//! invocations on one data dir take turns instead of failing. While a call
//! holds the database no other process can open it, which keeps each
//! conditional write atomic across processes.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use leasehold_lock::{KvStore, RocksDbStore, StoreError};
use leasehold_store::{Condition, Record, WriteOutcome};
use tracing::trace;

/// Attempts to open a database held by another process
pub const OPEN_ATTEMPTS: u32 = 250;

/// Pause between open attempts
pub const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(20);

pub struct SharedRocksDbStore {
    path: PathBuf,
}

impl SharedRocksDbStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the database, waiting while another process holds it
    async fn open(&self) -> Result<RocksDbStore, StoreError> {
        let mut attempt = 1;
        loop {
            match RocksDbStore::open(&self.path) {
                Ok(store) => return Ok(store),
                Err(e) if attempt < OPEN_ATTEMPTS => {
                    trace!(
                        path = %self.path.display(),
                        attempt,
                        error = %e,
                        "Store busy, retrying open"
                    );
                    attempt += 1;
                    tokio::time::sleep(OPEN_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl KvStore for SharedRocksDbStore {
    async fn read(&self, key: &str, consistent: bool) -> Result<Option<Record>, StoreError> {
        self.open().await?.read(key, consistent).await
    }

    async fn conditional_put(
        &self,
        key: &str,
        record: Record,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError> {
        self.open()
            .await?
            .conditional_put(key, record, condition)
            .await
    }

    async fn conditional_delete(
        &self,
        key: &str,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError> {
        self.open().await?.conditional_delete(key, condition).await
    }
}
