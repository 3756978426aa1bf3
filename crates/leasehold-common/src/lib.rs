//! Leasehold Common - Shared seams and constants
//!
//! This crate provides the pieces every other leasehold crate leans on:
//! - `Clock` and `Sleeper` seams so lease arithmetic and retry pauses can be
//!   driven by a fake clock in tests
//! - Default TTLs and key layout segments
//! - Namespace validation

pub mod clock;
pub mod utils;

pub use clock::{Clock, ManualClock, ManualSleeper, Sleeper, SystemClock, TokioSleeper};
pub use utils::is_valid_namespace;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "leasehold";

/// Default lease lifetime in seconds
pub const DEFAULT_LOCK_TTL_SECS: u64 = 60;

/// Default cached value lifetime in seconds
pub const DEFAULT_VALUE_TTL_SECS: u64 = 60;

/// Physical key segment for lease records (`<namespace>/l/<key>`)
pub const LEASE_SEGMENT: &str = "l";

/// Physical key segment for cached values (`<namespace>/v/<key>`)
pub const VALUE_SEGMENT: &str = "v";
