//! Leasehold Lock - Lease-based distributed mutual exclusion
//!
//! This crate provides:
//! - `LockManager`: acquire, extend and release leases through
//!   compare-and-swap writes, plus a retrying acquire and a scoped
//!   `with_lease` helper that always releases
//! - `LeaseHandle`: the caller's proof of ownership (fencing token)
//! - `ValueCache`: TTL-tagged values stored next to the leases
//! - `LeaseKeepAlive`: optional background extension of a held lease
//!
//! All coordination state lives in the backing `KvStore`.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod handle;
pub mod keepalive;
pub mod manager;
pub mod metrics;

pub use cache::ValueCache;
pub use codec::{CachedValue, KeyLayout, LeaseRecord};
pub use config::LockManagerConfig;
pub use error::LockError;
pub use handle::LeaseHandle;
pub use keepalive::LeaseKeepAlive;
pub use manager::{AcquireOptions, LockManager, LockManagerBuilder};

// Re-export the collaborator seams so callers need only this crate
pub use leasehold_common::{Clock, ManualClock, ManualSleeper, Sleeper, SystemClock, TokioSleeper};
pub use leasehold_store::{KvStore, MemoryStore, RocksDbStore, StoreError};
