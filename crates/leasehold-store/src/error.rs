//! Store adapter errors
//!
//! A failed condition is not an error: it is reported as
//! `WriteOutcome::ConditionFailed`. Everything here is a backend failure.

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),
}
