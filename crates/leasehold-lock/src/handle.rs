//! Lease handle returned by a successful acquisition

use std::fmt;

use crate::error::LockError;
use crate::manager::LockManager;

/// Proof of one specific acquisition of a lease
///
/// The token is the fencing token written with the lease. The handle holds
/// no expiry: whether the lease is still ours is only known to the store.
#[derive(Clone)]
pub struct LeaseHandle {
    key: String,
    token: String,
    manager: LockManager,
}

impl LeaseHandle {
    pub(crate) fn new(
        manager: LockManager,
        key: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            token: token.into(),
            manager,
        }
    }

    /// Logical key of the lease
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Fencing token of this acquisition
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn manager(&self) -> &LockManager {
        &self.manager
    }

    pub async fn extend(&self, ttl: Option<u64>) -> Result<(), LockError> {
        self.manager.extend(self, ttl).await
    }

    pub async fn release(&self) -> Result<bool, LockError> {
        self.manager.release(self).await
    }

    /// Whether the store still shows this acquisition as the valid lease
    pub async fn is_held(&self) -> Result<bool, LockError> {
        let now = self.manager.clock().now();
        Ok(self
            .manager
            .lease_info(&self.key)
            .await?
            .is_some_and(|lease| lease.token == self.token && lease.is_valid_at(now)))
    }
}

impl PartialEq for LeaseHandle {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.token == other.token
    }
}

impl Eq for LeaseHandle {}

impl fmt::Debug for LeaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseHandle")
            .field("key", &self.key)
            .field("token", &self.token)
            .field("worker_id", &self.manager.worker_id())
            .finish()
    }
}

impl fmt::Display for LeaseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.key, self.token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use leasehold_common::ManualClock;
    use leasehold_store::MemoryStore;

    use crate::config::LockManagerConfig;

    use super::*;

    #[tokio::test]
    async fn test_handle_delegates_to_manager() {
        let clock = Arc::new(ManualClock::new(1_000));
        let manager = LockManager::builder(Arc::new(MemoryStore::new()))
            .config(LockManagerConfig::default().with_worker_id("worker-a"))
            .clock(clock.clone())
            .build()
            .unwrap();

        let handle = manager.acquire("job", Some(10)).await.unwrap();
        assert!(handle.is_held().await.unwrap());

        handle.extend(Some(20)).await.unwrap();
        clock.advance(15);
        assert!(handle.is_held().await.unwrap());

        assert!(handle.release().await.unwrap());
        assert!(!handle.is_held().await.unwrap());
    }

    #[tokio::test]
    async fn test_is_held_false_after_expiry() {
        let clock = Arc::new(ManualClock::new(1_000));
        let manager = LockManager::builder(Arc::new(MemoryStore::new()))
            .clock(clock.clone())
            .build()
            .unwrap();

        let handle = manager.acquire("job", Some(10)).await.unwrap();
        clock.advance(10);
        assert!(!handle.is_held().await.unwrap());
    }

    #[test]
    fn test_resumed_handle_equals_original() {
        let manager = LockManager::new(
            Arc::new(MemoryStore::new()),
            LockManagerConfig::default(),
        )
        .unwrap();
        let a = manager.resume("job", "t-1");
        let b = manager.resume("job", "t-1");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "job#t-1");
        assert_ne!(a, manager.resume("job", "t-2"));
    }
}
