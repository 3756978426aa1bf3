//! Leasehold CLI - operator access to leases and cached values
//!
//! Every invocation works on the RocksDB store under `--data-dir`, runs one
//! command and exits. The database is only held open for the duration of
//! each store call. Leases survive between invocations, so a token
//! printed by `acquire` can be passed to a later `extend` or `release`
//! from the same worker id.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod store;
