// Embedded store backend using RocksDB
// Provides standalone (single-node) storage without an external service

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rocksdb::{DB, Options};
use tracing::{info, trace};

use crate::error::StoreError;
use crate::model::{Condition, Record, WriteOutcome};
use crate::traits::KvStore;

/// Standalone embedded store using RocksDB
///
/// Records are stored as JSON documents. Conditional writes take a
/// process-local write lock around read, evaluate and write, which makes
/// them atomic for every writer sharing this handle. RocksDB allows only
/// one process to open a database, so that covers every writer.
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Mutex<()>,
}

impl RocksDbStore {
    /// Open (or create) a database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path)?;
        info!(path = %path.display(), "Opened RocksDB store");

        Ok(Self::new(Arc::new(db)))
    }

    /// Create from a raw RocksDB instance
    pub fn new(db: Arc<DB>) -> Self {
        Self {
            db,
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self, key: &str) -> Result<Option<Record>, StoreError> {
        match self.db.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl KvStore for RocksDbStore {
    // RocksDB reads on a single node always observe the latest write.
    async fn read(&self, key: &str, _consistent: bool) -> Result<Option<Record>, StoreError> {
        self.load(key)
    }

    async fn conditional_put(
        &self,
        key: &str,
        record: Record,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError> {
        let bytes = serde_json::to_vec(&record)?;

        let _guard = self.write_lock.lock();
        let current = self.load(key)?;
        if !condition.matches(current.as_ref()) {
            trace!(key = %key, "rocksdb conditional put rejected");
            return Ok(WriteOutcome::ConditionFailed);
        }

        self.db.put(key.as_bytes(), bytes)?;
        trace!(key = %key, "rocksdb conditional put applied");
        Ok(WriteOutcome::Applied)
    }

    async fn conditional_delete(
        &self,
        key: &str,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError> {
        let _guard = self.write_lock.lock();
        let current = self.load(key)?;
        if !condition.matches(current.as_ref()) {
            trace!(key = %key, "rocksdb conditional delete rejected");
            return Ok(WriteOutcome::ConditionFailed);
        }

        if current.is_some() {
            self.db.delete(key.as_bytes())?;
        }
        trace!(key = %key, "rocksdb conditional delete applied");
        Ok(WriteOutcome::Applied)
    }
}
