//! Leasehold Store - Conditional key-value store adapters
//!
//! This crate provides:
//! - `KvStore`: the narrow interface the lock protocol needs (point read,
//!   conditional put, conditional delete)
//! - `Condition`: the predicate a conditional write is checked against
//! - `MemoryStore`: in-process backend built on DashMap
//! - `RocksDbStore`: embedded single-node backend built on RocksDB

pub mod embedded;
pub mod error;
pub mod memory;
pub mod model;
pub mod traits;

pub use embedded::RocksDbStore;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{Condition, Record, WriteOutcome};
pub use traits::KvStore;
