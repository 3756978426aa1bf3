//! Lock error taxonomy
//!
//! Releasing a lease that was already taken over is not an error; see
//! `LockManager::release`.

use leasehold_store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum LockError {
    /// The lease is held, unexpired, by another owner
    #[error("failed to acquire lock '{key}': held by another owner")]
    Acquisition { key: String },

    /// The lease was taken over or never existed; the critical section must stop
    #[error("failed to extend lock '{key}': lease with token {token} is no longer held")]
    Extend { key: String, token: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("malformed record at '{key}': {reason}")]
    Malformed { key: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl LockError {
    /// Whether this is lock contention, the only error the retry loop retries
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Acquisition { .. })
    }

    pub fn is_lease_lost(&self) -> bool {
        matches!(self, Self::Extend { .. })
    }
}
