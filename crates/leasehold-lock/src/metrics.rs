// Metrics for the lock protocol and value cache
// Counters go through the `metrics` facade; installing an exporter is the
// embedding application's job.

use metrics::{counter, describe_counter};

pub const LOCK_ACQUIRE_TOTAL: &str = "leasehold_lock_acquire_total";
pub const LOCK_EXTEND_TOTAL: &str = "leasehold_lock_extend_total";
pub const LOCK_RELEASE_TOTAL: &str = "leasehold_lock_release_total";
pub const CACHE_FETCH_TOTAL: &str = "leasehold_cache_fetch_total";

/// Initialize all metric descriptions
/// Should be called once at application startup
pub fn describe_metrics() {
    describe_counter!(
        LOCK_ACQUIRE_TOTAL,
        "Lease acquisition attempts by outcome (acquired, contended)"
    );
    describe_counter!(
        LOCK_EXTEND_TOTAL,
        "Lease extension attempts by outcome (extended, lost)"
    );
    describe_counter!(
        LOCK_RELEASE_TOTAL,
        "Lease release attempts by outcome (released, not_held)"
    );
    describe_counter!(
        CACHE_FETCH_TOTAL,
        "Value cache reads by outcome (hit, miss, expired)"
    );
}

pub(crate) fn record_acquire(acquired: bool) {
    let outcome = if acquired { "acquired" } else { "contended" };
    counter!(LOCK_ACQUIRE_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_extend(extended: bool) {
    let outcome = if extended { "extended" } else { "lost" };
    counter!(LOCK_EXTEND_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_release(released: bool) {
    let outcome = if released { "released" } else { "not_held" };
    counter!(LOCK_RELEASE_TOTAL, "outcome" => outcome).increment(1);
}

pub(crate) fn record_cache_fetch(outcome: &'static str) {
    counter!(CACHE_FETCH_TOTAL, "outcome" => outcome).increment(1);
}
