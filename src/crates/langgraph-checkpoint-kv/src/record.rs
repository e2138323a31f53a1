//! Record store abstraction
//!
//! The saver persists everything through [`RecordStore`], a minimal key-value
//! interface: point `get` and point `put` of a flat map of named fields
//! ("bins"), with an optional per-record expiry. The store is not expected to
//! offer transactions, batch atomicity, secondary indexes or server-side
//! queries.
//!
//! A missing key is `Ok(None)`, never an error. Errors are reserved for genuine
//! I/O or protocol failures and are reported as [`CheckpointError::Storage`].
//!
//! # Implementing a backend
//!
//! ```rust,ignore
//! use langgraph_checkpoint_kv::record::{Record, RecordKey, RecordStore};
//! use langgraph_checkpoint_kv::{CheckpointError, Result};
//! use async_trait::async_trait;
//! use std::time::Duration;
//!
//! struct AerospikeStore {
//!     client: aerospike::Client,
//! }
//!
//! #[async_trait]
//! impl RecordStore for AerospikeStore {
//!     async fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
//!         match self.client.get(&self.policy, &as_key(key), Bins::All) {
//!             Ok(rec) => Ok(Some(to_record(rec.bins))),
//!             Err(e) if is_not_found(&e) => Ok(None),
//!             Err(e) => Err(CheckpointError::Storage(format!("get failed for {}: {}", key, e))),
//!         }
//!     }
//!
//!     async fn put(&self, key: &RecordKey, record: Record, ttl: Option<Duration>) -> Result<()> {
//!         // write all bins, setting the record expiration from `ttl`
//!         todo!()
//!     }
//! }
//! ```

use crate::error::{CheckpointError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A single field value in a stored record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bin {
    Str(String),
    Int(i64),
    Bytes(Vec<u8>),
}

impl Bin {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Bin::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Bin::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Bin::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl From<String> for Bin {
    fn from(value: String) -> Self {
        Bin::Str(value)
    }
}

impl From<&str> for Bin {
    fn from(value: &str) -> Self {
        Bin::Str(value.to_string())
    }
}

impl From<i64> for Bin {
    fn from(value: i64) -> Self {
        Bin::Int(value)
    }
}

impl From<Vec<u8>> for Bin {
    fn from(value: Vec<u8>) -> Self {
        Bin::Bytes(value)
    }
}

/// A stored record: field name to value
pub type Record = BTreeMap<String, Bin>;

/// Fully qualified key of a record in the backend
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Backend namespace (database / keyspace)
    pub namespace: String,
    /// Record set (table / collection) within the namespace
    pub set: String,
    /// User key within the set
    pub key: String,
}

impl RecordKey {
    pub fn new(
        namespace: impl Into<String>,
        set: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            set: set.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.set, self.key)
    }
}

/// Point-operation key-value backend
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record, or `None` if the key does not exist (or has expired)
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>>;

    /// Write a record, replacing any existing record under the key.
    ///
    /// `ttl` of `None` means the record never expires.
    async fn put(&self, key: &RecordKey, record: Record, ttl: Option<Duration>) -> Result<()>;

    /// Re-arm the expiry of an existing record.
    ///
    /// Backends without expiry support can keep the default no-op.
    async fn touch(&self, _key: &RecordKey, _ttl: Duration) -> Result<()> {
        Ok(())
    }
}

/// Shared handle to the record store plus the write TTL applied to every put
#[derive(Clone)]
pub(crate) struct Backend {
    store: Arc<dyn RecordStore>,
    ttl: Option<Duration>,
}

impl Backend {
    pub(crate) fn new(store: Arc<dyn RecordStore>, ttl: Option<Duration>) -> Self {
        Self { store, ttl }
    }

    pub(crate) fn store(&self) -> Arc<dyn RecordStore> {
        self.store.clone()
    }

    pub(crate) async fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        self.store.get(key).await
    }

    pub(crate) async fn put(&self, key: &RecordKey, record: Record) -> Result<()> {
        self.store.put(key, record, self.ttl).await
    }

    pub(crate) async fn touch(&self, key: &RecordKey, ttl: Duration) -> Result<()> {
        self.store.touch(key, ttl).await
    }
}

/// Read the JSON array stored in `field` of an auxiliary record.
///
/// Absent record, absent field, wrong bin type or unparsable JSON all yield an
/// empty list: a corrupt index record must never block reads or writes.
pub(crate) fn read_json_items(record: Option<&Record>, field: &str, key: &RecordKey) -> Vec<Value> {
    let Some(record) = record else {
        return Vec::new();
    };
    let Some(raw) = record.get(field).and_then(Bin::as_str) else {
        tracing::warn!(%key, field, "auxiliary record missing field, treating as empty");
        return Vec::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!(%key, field, "auxiliary record is not a list, treating as empty");
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(%key, field, error = %e, "malformed auxiliary record, treating as empty");
            Vec::new()
        }
    }
}

/// Encode a list of JSON items into a single-field auxiliary record
pub(crate) fn json_items_record(field: &str, items: &[Value]) -> Result<Record> {
    let raw = serde_json::to_string(items)?;
    let mut record = Record::new();
    record.insert(field.to_string(), Bin::Str(raw));
    Ok(record)
}

/// Fetch a required string field, reporting the record key on failure
pub(crate) fn require_str<'a>(record: &'a Record, field: &str, key: &RecordKey) -> Result<&'a str> {
    record
        .get(field)
        .and_then(Bin::as_str)
        .ok_or_else(|| CheckpointError::Decode(format!("{} missing string field {}", key, field)))
}
