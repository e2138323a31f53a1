//! In-memory record store for development and testing
//!
//! [`InMemoryRecordStore`] implements [`RecordStore`] over a
//! `Arc<RwLock<HashMap>>`. Plug it into
//! [`KvCheckpointSaver`](crate::saver::KvCheckpointSaver) to get the full
//! saver behavior without a running database:
//!
//! ```rust
//! use langgraph_checkpoint_kv::{InMemoryRecordStore, KvCheckpointSaver};
//! use std::sync::Arc;
//!
//! let saver = KvCheckpointSaver::new(Arc::new(InMemoryRecordStore::new()));
//! ```
//!
//! # Expiry
//!
//! Records written with a TTL carry a deadline measured on the tokio clock.
//! Expired records read as absent and are dropped lazily on the next access to
//! their key. Because the deadline uses `tokio::time::Instant`, tests can drive
//! expiry deterministically with a paused runtime and `tokio::time::advance`.
//!
//! # Limitations
//!
//! 1. **No Persistence** - All data lost on restart
//! 2. **Single Process** - Cannot share across processes
//! 3. **Memory Bound** - Expired records only free memory when touched or cleared
//!
//! Cloning the store is shallow: clones share the same records.

use crate::error::Result;
use crate::record::{Record, RecordKey, RecordStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct StoredRecord {
    record: Record,
    expires_at: Option<Instant>,
}

impl StoredRecord {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

type RecordMap = Arc<RwLock<HashMap<RecordKey, StoredRecord>>>;

/// Thread-safe in-memory [`RecordStore`]
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: RecordMap,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) records
    pub async fn record_count(&self) -> usize {
        let now = Instant::now();
        self.records
            .read()
            .await
            .values()
            .filter(|stored| !stored.is_expired(now))
            .count()
    }

    /// Drop every record (useful between tests)
    pub async fn clear(&self) {
        self.records.write().await.clear();
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        let now = Instant::now();
        {
            let records = self.records.read().await;
            match records.get(key) {
                None => return Ok(None),
                Some(stored) if !stored.is_expired(now) => return Ok(Some(stored.record.clone())),
                Some(_) => {}
            }
        }

        let mut records = self.records.write().await;
        if records.get(key).is_some_and(|stored| stored.is_expired(now)) {
            records.remove(key);
            tracing::debug!(%key, "expired record evicted");
        }
        Ok(None)
    }

    async fn put(&self, key: &RecordKey, record: Record, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.and_then(|ttl| deadline(Instant::now(), ttl));
        self.records
            .write()
            .await
            .insert(key.clone(), StoredRecord { record, expires_at });
        Ok(())
    }

    async fn touch(&self, key: &RecordKey, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let mut records = self.records.write().await;
        if let Some(stored) = records.get_mut(key) {
            if stored.is_expired(now) {
                records.remove(key);
            } else {
                stored.expires_at = deadline(now, ttl);
            }
        }
        Ok(())
    }
}

/// Expiry deadline for a TTL; `None` (never expires) when it lies past the clock's range
fn deadline(now: Instant, ttl: Duration) -> Option<Instant> {
    now.checked_add(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Bin;

    fn key(name: &str) -> RecordKey {
        RecordKey::new("test", "lg_cp", name)
    }

    fn record(value: i64) -> Record {
        let mut record = Record::new();
        record.insert("v".to_string(), Bin::Int(value));
        record
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = InMemoryRecordStore::new();
        assert_eq!(store.get(&key("a")).await.unwrap(), None);

        store.put(&key("a"), record(1), None).await.unwrap();
        store.put(&key("a"), record(2), None).await.unwrap();

        assert_eq!(store.get(&key("a")).await.unwrap(), Some(record(2)));
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test]
    async fn test_sets_are_distinct() {
        let store = InMemoryRecordStore::new();
        store.put(&key("a"), record(1), None).await.unwrap();

        let other_set = RecordKey::new("test", "lg_cp_w", "a");
        assert_eq!(store.get(&other_set).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clones_share_records() {
        let store = InMemoryRecordStore::new();
        let clone = store.clone();
        store.put(&key("a"), record(1), None).await.unwrap();

        assert_eq!(clone.get(&key("a")).await.unwrap(), Some(record(1)));
        clone.clear().await;
        assert_eq!(store.record_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let store = InMemoryRecordStore::new();
        store
            .put(&key("a"), record(1), Some(Duration::from_secs(60)))
            .await
            .unwrap();
        store.put(&key("b"), record(2), None).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get(&key("a")).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get(&key("a")).await.unwrap(), None);
        assert!(store.get(&key("b")).await.unwrap().is_some());
        assert_eq!(store.record_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_touch_extends_deadline() {
        let store = InMemoryRecordStore::new();
        let ttl = Duration::from_secs(60);
        store.put(&key("a"), record(1), Some(ttl)).await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        store.touch(&key("a"), ttl).await.unwrap();

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(store.get(&key("a")).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.get(&key("a")).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_ttl_never_expires() {
        let store = InMemoryRecordStore::new();
        let forever = Duration::from_secs(u64::MAX);
        store.put(&key("a"), record(1), Some(forever)).await.unwrap();
        store.touch(&key("a"), forever).await.unwrap();

        tokio::time::advance(Duration::from_secs(365 * 24 * 3600)).await;
        assert!(store.get(&key("a")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_touch_missing_is_noop() {
        let store = InMemoryRecordStore::new();
        store
            .touch(&key("missing"), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.record_count().await, 0);
    }
}
