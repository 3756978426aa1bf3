//! Physical key layout and record encoding
//!
//! Leases live at `<namespace>/l/<key>` with fields `w` (owner), `lid`
//! (fencing token) and `e` (expiry, epoch seconds). Cached values live at
//! `<namespace>/v/<key>` with fields `v` and `e`. The two prefixes keep a
//! lock and a cached value with the same logical key apart.

use leasehold_common::{LEASE_SEGMENT, VALUE_SEGMENT};
use leasehold_store::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const OWNER_FIELD: &str = "w";
pub const TOKEN_FIELD: &str = "lid";
pub const EXPIRY_FIELD: &str = "e";
pub const VALUE_FIELD: &str = "v";

/// Maps logical keys to physical keys within one namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    namespace: String,
}

impl KeyLayout {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn lease_key(&self, key: &str) -> String {
        format!("{}/{}/{}", self.namespace, LEASE_SEGMENT, key)
    }

    pub fn value_key(&self, key: &str) -> String {
        format!("{}/{}/{}", self.namespace, VALUE_SEGMENT, key)
    }
}

/// Stored lease: who holds it, which acquisition, and until when
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    #[serde(rename = "w")]
    pub owner: String,
    #[serde(rename = "lid")]
    pub token: String,
    #[serde(rename = "e")]
    pub expiry: i64,
}

impl LeaseRecord {
    /// A lease is valid iff its expiry is strictly in the future
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expiry > now
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(OWNER_FIELD.to_string(), Value::from(self.owner.as_str()));
        record.insert(TOKEN_FIELD.to_string(), Value::from(self.token.as_str()));
        record.insert(EXPIRY_FIELD.to_string(), Value::from(self.expiry));
        record
    }

    pub fn from_record(record: Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record))
    }
}

/// Stored cache entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedValue {
    #[serde(rename = "v")]
    pub value: Value,
    #[serde(rename = "e")]
    pub expiry: i64,
}

impl CachedValue {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiry <= now
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(VALUE_FIELD.to_string(), self.value.clone());
        record.insert(EXPIRY_FIELD.to_string(), Value::from(self.expiry));
        record
    }

    pub fn from_record(record: Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record))
    }
}
