//! Lock manager configuration
//!
//! Loaded from an optional config file, then `LEASEHOLD_*` environment
//! variables (`__` separates nested keys), then explicit overrides.

use std::path::Path;

use config::{Config, Environment, File};
use leasehold_common::{
    DEFAULT_LOCK_TTL_SECS, DEFAULT_NAMESPACE, DEFAULT_VALUE_TTL_SECS, is_valid_namespace,
};
use serde::Deserialize;

use crate::error::LockError;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "leasehold";

/// Configuration for a `LockManager` instance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LockManagerConfig {
    /// Prefix isolating this manager's keys from others sharing a table
    pub namespace: String,
    /// Owner id written into leases; random per manager when unset
    pub worker_id: Option<String>,
    /// Lease lifetime used when a call passes no TTL
    pub lock_default_ttl_secs: u64,
    /// Cached value lifetime used when a call passes no TTL
    pub value_default_ttl_secs: u64,
    /// Request strongly-consistent point reads from the store
    pub consistent_reads: bool,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            worker_id: None,
            lock_default_ttl_secs: DEFAULT_LOCK_TTL_SECS,
            value_default_ttl_secs: DEFAULT_VALUE_TTL_SECS,
            consistent_reads: true,
        }
    }
}

impl LockManagerConfig {
    /// Load from an optional file plus `LEASEHOLD_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, LockError> {
        Self::load_with_env(path, None)
    }

    /// Same as `load`, with the environment replaced by `env` when given
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, LockError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config: Self = builder
            .build()
            .and_then(|config| config.try_deserialize::<Self>())
            .map_err(|e| LockError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = Some(worker_id.into());
        self
    }

    pub fn with_lock_ttl(mut self, secs: u64) -> Self {
        self.lock_default_ttl_secs = secs;
        self
    }

    pub fn with_value_ttl(mut self, secs: u64) -> Self {
        self.value_default_ttl_secs = secs;
        self
    }

    pub fn with_consistent_reads(mut self, consistent_reads: bool) -> Self {
        self.consistent_reads = consistent_reads;
        self
    }

    pub fn validate(&self) -> Result<(), LockError> {
        if !is_valid_namespace(&self.namespace) {
            return Err(LockError::Config(format!(
                "invalid namespace '{}': expected [a-zA-Z0-9_.:-]+",
                self.namespace
            )));
        }
        if self.lock_default_ttl_secs == 0 {
            return Err(LockError::Config(
                "lock_default_ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.worker_id.as_deref().is_some_and(str::is_empty) {
            return Err(LockError::Config("worker_id must not be empty".to_string()));
        }
        Ok(())
    }
}
