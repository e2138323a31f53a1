//! Checkpoint saver over a point-operation key-value store
//!
//! [`KvCheckpointSaver`] implements [`CheckpointSaver`] using nothing but
//! single-key `get`/`put` against a [`RecordStore`]. The backend offers no
//! sorting, secondary indexes or multi-key transactions, so the saver keeps
//! its own per-scope indexes:
//!
//! ```text
//! put(config, checkpoint, metadata)
//!   1. checkpoint record   "{tid}|{ns}|{id}"         set_checkpoints
//!   2. latest pointer      "{tid}|{ns}|__latest__"   set_meta
//!   3. timeline            "{tid}|{ns}|__timeline__" set_meta
//!
//! put_writes(config, writes, task)
//!   write ledger           "{tid}|{ns}|{id}"         set_writes
//! ```
//!
//! # Partial writes
//!
//! The three `put` steps are independent writes. If step 1 fails the error is
//! returned unchanged and nothing was stored. If step 2 or 3 fails, the
//! checkpoint is durable but not yet reachable through "latest" or `list`;
//! this is reported as [`CheckpointError::PartialWrite`] carrying the config of
//! the stored checkpoint. Step 3 is not attempted after a step 2 failure.
//! Retrying the same `put` repairs both indexes.
//!
//! # Concurrency
//!
//! The saver holds no locks. Concurrent `put`s on the same scope race on the
//! read-modify-write of the timeline and on the pointer overwrite; the last
//! write to each record wins. Distinct scopes never contend.
//!
//! # Lenient reads
//!
//! Reads never fail on stored data: an undecodable checkpoint reads as absent,
//! undecodable pending writes and timeline entries are skipped, and corrupt
//! auxiliary records read as empty.

use crate::checkpoint::{
    ChannelVersions, Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple,
    CHECKPOINT_TS,
};
use crate::clock::now_nanos;
use crate::config::SaverConfig;
use crate::error::{CheckpointError, PutStage, Result};
use crate::keys::{validate_checkpoint_id, KeySpace, Scope};
use crate::latest::LatestPointer;
use crate::record::{require_str, Backend, Bin, Record, RecordKey, RecordStore};
use crate::serializer::{JsonSerializer, SerializerProtocol};
use crate::timeline::{entries_after, TimelineEntry, TimelineIndex};
use crate::traits::{CheckpointSaver, CheckpointStream};
use crate::writes::WriteLedger;
use async_trait::async_trait;
use futures::stream;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

mod bins {
    pub const THREAD_ID: &str = "thread_id";
    pub const CHECKPOINT_NS: &str = "checkpoint_ns";
    pub const CHECKPOINT_ID: &str = "checkpoint_id";
    pub const PARENT_CHECKPOINT_ID: &str = "p_checkpoint_id";
    pub const CHECKPOINT_TYPE: &str = "cp_type";
    pub const CHECKPOINT: &str = "checkpoint";
    pub const METADATA_TYPE: &str = "meta_type";
    pub const METADATA: &str = "metadata";
    pub const TS: &str = "ts";
}

/// [`CheckpointSaver`] backed by any [`RecordStore`]
///
/// Cloning is cheap; clones share the store.
///
/// # Example
///
/// ```rust
/// use langgraph_checkpoint_kv::config::{SaverConfig, TtlConfig};
/// use langgraph_checkpoint_kv::{InMemoryRecordStore, KvCheckpointSaver};
/// use std::sync::Arc;
///
/// let config = SaverConfig::default()
///     .with_namespace("graphs")
///     .with_ttl(TtlConfig::new(24 * 60).with_refresh_on_read(true));
/// let saver = KvCheckpointSaver::with_config(Arc::new(InMemoryRecordStore::new()), config)?;
/// # Ok::<(), langgraph_checkpoint_kv::CheckpointError>(())
/// ```
#[derive(Clone)]
pub struct KvCheckpointSaver {
    config: SaverConfig,
    backend: Backend,
    keys: KeySpace,
    serde: Arc<dyn SerializerProtocol>,
    latest: LatestPointer,
    timeline: TimelineIndex,
    writes: WriteLedger,
}

impl KvCheckpointSaver {
    /// Create a saver with the default configuration and JSON serialization
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self::build(store, SaverConfig::default(), Arc::new(JsonSerializer::new()))
    }

    /// Create a saver with a custom configuration
    pub fn with_config(store: Arc<dyn RecordStore>, config: SaverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(store, config, Arc::new(JsonSerializer::new())))
    }

    /// Replace the payload serializer
    pub fn with_serializer(self, serde: Arc<dyn SerializerProtocol>) -> Self {
        let store = self.backend.store();
        Self::build(store, self.config, serde)
    }

    pub fn config(&self) -> &SaverConfig {
        &self.config
    }

    fn build(
        store: Arc<dyn RecordStore>,
        config: SaverConfig,
        serde: Arc<dyn SerializerProtocol>,
    ) -> Self {
        let backend = Backend::new(store, config.ttl_duration());
        let keys = config.key_space();
        Self {
            latest: LatestPointer::new(backend.clone(), keys.clone()),
            timeline: TimelineIndex::new(backend.clone(), keys.clone(), config.timeline_max),
            writes: WriteLedger::new(
                backend.clone(),
                keys.clone(),
                serde.clone(),
                config.special_channels.clone(),
            ),
            config,
            backend,
            keys,
            serde,
        }
    }

    fn refresh_ttl(&self) -> Option<Duration> {
        self.config
            .ttl
            .filter(|ttl| ttl.refresh_on_read)
            .map(|ttl| ttl.duration())
    }

    /// Resolve one checkpoint with its pending writes; `None` if absent or undecodable
    async fn load(&self, scope: &Scope, checkpoint_id: &str) -> Result<Option<CheckpointTuple>> {
        let key = self.keys.checkpoint(scope, checkpoint_id);
        let Some(record) = self.backend.get(&key).await? else {
            tracing::debug!(%key, "checkpoint not found");
            return Ok(None);
        };

        let (checkpoint, metadata) = match self.decode_checkpoint(&record, &key) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(%key, error = %e, "undecodable checkpoint, treating as not found");
                return Ok(None);
            }
        };

        let pending_writes = self.writes.read(scope, checkpoint_id).await?;

        let mut tuple = CheckpointTuple::new(scope.config_for(checkpoint_id), checkpoint, metadata)
            .with_pending_writes(pending_writes);
        if let Some(parent_id) = record
            .get(bins::PARENT_CHECKPOINT_ID)
            .and_then(Bin::as_str)
            .filter(|id| !id.is_empty())
        {
            tuple = tuple.with_parent_config(scope.config_for(parent_id));
        }

        if let Some(ttl) = self.refresh_ttl() {
            self.refresh(&[key, self.writes.key(scope, checkpoint_id)], ttl)
                .await;
        }

        Ok(Some(tuple))
    }

    fn decode_checkpoint(
        &self,
        record: &Record,
        key: &RecordKey,
    ) -> Result<(Checkpoint, CheckpointMetadata)> {
        let checkpoint = self.decode_payload(record, bins::CHECKPOINT_TYPE, bins::CHECKPOINT, key)?;
        let metadata = self.decode_payload(record, bins::METADATA_TYPE, bins::METADATA, key)?;
        Ok((
            serde_json::from_value(checkpoint)
                .map_err(|e| CheckpointError::Decode(format!("{}: checkpoint: {}", key, e)))?,
            serde_json::from_value(metadata)
                .map_err(|e| CheckpointError::Decode(format!("{}: metadata: {}", key, e)))?,
        ))
    }

    fn decode_payload(
        &self,
        record: &Record,
        type_field: &str,
        bytes_field: &str,
        key: &RecordKey,
    ) -> Result<Value> {
        let type_tag = require_str(record, type_field, key)?;
        let bytes = record
            .get(bytes_field)
            .and_then(Bin::as_bytes)
            .ok_or_else(|| {
                CheckpointError::Decode(format!("{} missing bytes field {}", key, bytes_field))
            })?;
        self.serde.loads_typed(type_tag, bytes)
    }

    async fn refresh(&self, keys: &[RecordKey], ttl: Duration) {
        for key in keys {
            if let Err(e) = self.backend.touch(key, ttl).await {
                tracing::warn!(%key, error = %e, "failed to refresh record ttl");
            }
        }
    }
}

/// Overlay config-supplied metadata on the payload metadata
fn merge_metadata(
    metadata: CheckpointMetadata,
    overrides: &HashMap<String, Value>,
) -> Result<CheckpointMetadata> {
    if overrides.is_empty() {
        return Ok(metadata);
    }
    let mut merged = match serde_json::to_value(metadata)? {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    for (key, value) in overrides {
        merged.insert(key.clone(), value.clone());
    }
    serde_json::from_value(Value::Object(merged))
        .map_err(|e| CheckpointError::Invalid(format!("config metadata does not fit checkpoint metadata: {}", e)))
}

/// Every filter key must be present in the metadata with an equal value
fn matches_filter(metadata: &CheckpointMetadata, filter: &HashMap<String, Value>) -> Result<bool> {
    if filter.is_empty() {
        return Ok(true);
    }
    let Value::Object(fields) = serde_json::to_value(metadata)? else {
        return Ok(false);
    };
    Ok(filter
        .iter()
        .all(|(key, expected)| fields.get(key) == Some(expected)))
}

/// Cursor state of a `list` stream
struct ListState {
    saver: KvCheckpointSaver,
    scope: Scope,
    filter: HashMap<String, Value>,
    remaining: Option<usize>,
    entries: std::vec::IntoIter<TimelineEntry>,
}

impl ListState {
    /// Resolve timeline entries until one matches the filter
    async fn next_match(mut self) -> Result<Option<(CheckpointTuple, Self)>> {
        if self.remaining == Some(0) {
            return Ok(None);
        }
        while let Some(entry) = self.entries.next() {
            let Some(tuple) = self.saver.load(&self.scope, &entry.checkpoint_id).await? else {
                tracing::debug!(
                    checkpoint_id = %entry.checkpoint_id,
                    ts = entry.ts,
                    "timeline entry did not resolve, skipping"
                );
                continue;
            };
            if !matches_filter(&tuple.metadata, &self.filter)? {
                continue;
            }
            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Ok(Some((tuple, self)));
        }
        Ok(None)
    }
}

#[async_trait]
impl CheckpointSaver for KvCheckpointSaver {
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let scope = Scope::from_config(config)?;
        let checkpoint_id = match &config.checkpoint_id {
            Some(id) => id.clone(),
            None => match self.latest.read(&scope).await? {
                Some(latest) => {
                    tracing::debug!(
                        checkpoint_id = %latest.checkpoint_id,
                        ts = latest.ts,
                        "resolved latest checkpoint"
                    );
                    latest.checkpoint_id
                }
                None => return Ok(None),
            },
        };
        self.load(&scope, &checkpoint_id).await
    }

    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        filter: Option<HashMap<String, Value>>,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream> {
        let config = config.ok_or_else(|| {
            CheckpointError::Invalid("list requires a config with thread_id".to_string())
        })?;
        let scope = Scope::from_config(config)?;

        let mut entries = self.timeline.read(&scope).await?;
        if let Some(before_id) = before.and_then(|b| b.checkpoint_id.as_deref()) {
            entries = entries_after(entries, before_id);
        }
        tracing::debug!(
            thread_id = scope.thread_id(),
            checkpoint_ns = scope.checkpoint_ns(),
            candidates = entries.len(),
            "listing checkpoints"
        );

        let state = ListState {
            saver: self.clone(),
            scope,
            filter: filter.unwrap_or_default(),
            remaining: limit,
            entries: entries.into_iter(),
        };
        Ok(Box::pin(stream::try_unfold(state, ListState::next_match)))
    }

    async fn put(
        &self,
        config: &CheckpointConfig,
        mut checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        _new_versions: ChannelVersions,
    ) -> Result<CheckpointConfig> {
        let scope = Scope::from_config(config)?;
        validate_checkpoint_id(&checkpoint.id)?;
        let checkpoint_id = checkpoint.id.clone();
        let ts = *checkpoint.ts.get_or_insert_with(now_nanos);
        let metadata = merge_metadata(metadata, &config.metadata)?;

        let (cp_type, cp_bytes) = self.serde.dumps_typed(&serde_json::to_value(&checkpoint)?)?;
        let (meta_type, meta_bytes) = self.serde.dumps_typed(&serde_json::to_value(&metadata)?)?;

        let mut record = Record::new();
        record.insert(bins::THREAD_ID.into(), Bin::from(scope.thread_id()));
        record.insert(bins::CHECKPOINT_NS.into(), Bin::from(scope.checkpoint_ns()));
        record.insert(bins::CHECKPOINT_ID.into(), Bin::from(checkpoint_id.as_str()));
        if let Some(parent_id) = config.checkpoint_id.as_deref().filter(|id| !id.is_empty()) {
            record.insert(bins::PARENT_CHECKPOINT_ID.into(), Bin::from(parent_id));
        }
        record.insert(bins::CHECKPOINT_TYPE.into(), Bin::Str(cp_type));
        record.insert(bins::CHECKPOINT.into(), Bin::Bytes(cp_bytes));
        record.insert(bins::METADATA_TYPE.into(), Bin::Str(meta_type));
        record.insert(bins::METADATA.into(), Bin::Bytes(meta_bytes));
        record.insert(bins::TS.into(), Bin::Int(ts));

        let key = self.keys.checkpoint(&scope, &checkpoint_id);
        self.backend.put(&key, record).await?;
        tracing::debug!(%key, ts, "checkpoint stored");

        let mut committed = config.clone();
        committed.thread_id = Some(scope.thread_id().to_string());
        committed.checkpoint_ns = Some(scope.checkpoint_ns().to_string());
        committed.checkpoint_id = Some(checkpoint_id.clone());
        committed.extra.insert(CHECKPOINT_TS.to_string(), Value::from(ts));

        if let Err(e) = self.latest.record(&scope, &checkpoint_id, ts).await {
            tracing::warn!(%key, error = %e, "checkpoint stored but latest pointer update failed");
            return Err(CheckpointError::PartialWrite {
                config: committed,
                stage: PutStage::LatestPointer,
                source: Box::new(e),
            });
        }

        if let Err(e) = self.timeline.record(&scope, ts, &checkpoint_id).await {
            tracing::warn!(%key, error = %e, "checkpoint stored but timeline update failed");
            return Err(CheckpointError::PartialWrite {
                config: committed,
                stage: PutStage::Timeline,
                source: Box::new(e),
            });
        }

        Ok(committed)
    }

    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
        task_path: &str,
    ) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }
        let scope = Scope::from_config(config)?;
        let Some(checkpoint_id) = config
            .checkpoint_id
            .as_deref()
            .filter(|id| !id.is_empty())
        else {
            tracing::debug!(
                thread_id = scope.thread_id(),
                task_id,
                "put_writes without checkpoint_id, ignoring"
            );
            return Ok(());
        };
        self.writes
            .append(&scope, checkpoint_id, task_id, task_path, &writes)
            .await
    }
}
