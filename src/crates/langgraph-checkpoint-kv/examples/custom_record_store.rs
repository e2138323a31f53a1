//! Example of plugging a custom backend into the checkpoint saver
//!
//! A backend only has to implement [`RecordStore`]: point `get` and point `put`
//! of a flat record, plus an optional `touch` for TTL refresh. Everything else
//! (latest pointer, timeline, write ledger, listing) is handled by
//! [`KvCheckpointSaver`].
//!
//! This example uses a plain mutex-guarded map that ignores TTLs and logs each
//! operation, then walks through a short resume/history session.
//!
//! A real backend maps the same three calls onto its client:
//!
//! ```rust,ignore
//! #[async_trait]
//! impl RecordStore for RedisStore {
//!     async fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
//!         let mut conn = self.pool.get().await.map_err(storage)?;
//!         let fields: HashMap<String, Vec<u8>> = conn.hgetall(key.to_string()).await.map_err(storage)?;
//!         Ok((!fields.is_empty()).then(|| decode_bins(fields)))
//!     }
//!
//!     async fn put(&self, key: &RecordKey, record: Record, ttl: Option<Duration>) -> Result<()> {
//!         let mut pipe = redis::pipe();
//!         pipe.atomic().del(key.to_string()).hset_multiple(key.to_string(), &encode_bins(record));
//!         if let Some(ttl) = ttl {
//!             pipe.expire(key.to_string(), ttl.as_secs() as i64);
//!         }
//!         pipe.query_async(&mut self.pool.get().await.map_err(storage)?).await.map_err(storage)
//!     }
//! }
//! ```

use async_trait::async_trait;
use futures::TryStreamExt;
use langgraph_checkpoint_kv::{
    Checkpoint, CheckpointConfig, CheckpointError, CheckpointMetadata, CheckpointSaver,
    CheckpointSource, KvCheckpointSaver, Record, RecordKey, RecordStore, Result,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Record store over a mutex-guarded map; TTLs are ignored
#[derive(Default)]
struct MapStore {
    records: Mutex<HashMap<RecordKey, Record>>,
}

impl MapStore {
    fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MapStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>> {
        let records = self
            .records
            .lock()
            .map_err(|_| CheckpointError::Storage("map poisoned".into()))?;
        let found = records.get(key).cloned();
        println!("  get  {} -> {}", key, if found.is_some() { "hit" } else { "miss" });
        Ok(found)
    }

    async fn put(&self, key: &RecordKey, record: Record, _ttl: Option<Duration>) -> Result<()> {
        println!("  put  {} ({} bins)", key, record.len());
        self.records
            .lock()
            .map_err(|_| CheckpointError::Storage("map poisoned".into()))?
            .insert(key.clone(), record);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== Custom RecordStore Example ===\n");

    let store = Arc::new(MapStore::default());
    let saver = KvCheckpointSaver::new(store.clone());
    let config = CheckpointConfig::new().with_thread_id("demo-thread");

    println!("1. Store the input checkpoint");
    let first = saver
        .put(
            &config,
            Checkpoint::new("cp-0", HashMap::from([("count".to_string(), json!(0))])),
            CheckpointMetadata::new()
                .with_source(CheckpointSource::Input)
                .with_step(-1),
            HashMap::new(),
        )
        .await?;

    println!("\n2. A task reports its output against cp-0");
    saver
        .put_writes(&first, vec![("count".to_string(), json!(1))], "increment", "graph:increment")
        .await?;

    println!("\n3. Resume from cp-0 and store the next checkpoint");
    saver
        .put(
            &first,
            Checkpoint::new("cp-1", HashMap::from([("count".to_string(), json!(1))])),
            CheckpointMetadata::new()
                .with_source(CheckpointSource::Loop)
                .with_step(0),
            HashMap::new(),
        )
        .await?;

    println!("\n4. Load the latest checkpoint");
    if let Some(tuple) = saver.get_tuple(&config).await? {
        println!(
            "  latest = {} (parent {:?}), count = {}",
            tuple.checkpoint.id,
            tuple.parent_config.and_then(|p| p.checkpoint_id),
            tuple.checkpoint.channel_values["count"]
        );
    }

    println!("\n5. Walk the history");
    let history: Vec<_> = saver
        .list(Some(&config), None, None, None)
        .await?
        .try_collect()
        .await?;
    for tuple in history {
        println!(
            "  {} step={:?} pending_writes={}",
            tuple.checkpoint.id,
            tuple.metadata.step,
            tuple.pending_writes.len()
        );
    }

    println!("\n{} records in the store", store.len());
    Ok(())
}
