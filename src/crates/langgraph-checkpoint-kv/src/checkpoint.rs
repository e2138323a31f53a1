//! Core checkpoint data structures
//!
//! This module defines the values that flow through a [`CheckpointSaver`](crate::traits::CheckpointSaver):
//! **[`Checkpoint`]**, **[`CheckpointConfig`]**, **[`CheckpointMetadata`]** and
//! **[`CheckpointTuple`]**.
//!
//! # Identity
//!
//! A checkpoint is addressed by its *scope* (`thread_id` + `checkpoint_ns`) and its `id`.
//! The id is supplied by the caller and must be unique within the scope; storing a second
//! checkpoint under the same id overwrites the first.
//!
//! ```text
//! CheckpointConfig
//!   • thread_id:     "user-123"      (required)
//!   • checkpoint_ns: ""              (defaults to the empty namespace)
//!   • checkpoint_id: "cp-7"          (omit to address the latest checkpoint)
//!   • metadata:      {..}            (merged into stored metadata on put)
//! ```
//!
//! # Timestamps
//!
//! [`Checkpoint::ts`] is an integer count of nanoseconds since the Unix epoch. When a
//! checkpoint is stored without one, the saver stamps it with [`crate::clock::now_nanos`].
//!
//! # Pending Writes
//!
//! A [`PendingWrite`] is a `(task_id, channel, value)` triple produced by a task before its
//! output is folded into the next checkpoint. Reads return the pending writes recorded against
//! a checkpoint in [`CheckpointTuple::pending_writes`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Checkpoint ID type
pub type CheckpointId = String;

/// Pending write tuple: (task_id, channel, value)
pub type PendingWrite = (String, String, Value);

/// Channel version type - can be int, float, or string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ChannelVersion {
    Int(i64),
    Float(f64),
    String(String),
}

/// Mapping from channel name to version
pub type ChannelVersions = HashMap<String, ChannelVersion>;

/// Metadata source type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Checkpoint created from an input to invoke/stream/batch
    Input,
    /// Checkpoint created from inside the pregel loop
    Loop,
    /// Checkpoint created from a manual state update
    Update,
    /// Checkpoint created as a copy of another checkpoint
    Fork,
}

/// Metadata associated with a checkpoint
///
/// All fields, including the flattened `extra` entries, are visible to the
/// metadata filter of [`list`](crate::traits::CheckpointSaver::list).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointMetadata {
    /// The source of the checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// The step number of the checkpoint
    /// -1 for the first "input" checkpoint
    /// 0 for the first "loop" checkpoint
    /// n for the nth checkpoint afterwards
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<i32>,

    /// The IDs of the parent checkpoints
    /// Mapping from checkpoint namespace to checkpoint ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parents: Option<HashMap<String, String>>,

    /// Additional custom metadata
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl CheckpointMetadata {
    /// Create a new checkpoint metadata
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the source
    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Set the step number
    pub fn with_step(mut self, step: i32) -> Self {
        self.step = Some(step);
        self
    }

    /// Add custom metadata
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// State snapshot at a given point in time
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// The version of the checkpoint format (currently 1)
    pub v: i32,

    /// The ID of the checkpoint, unique within its scope
    pub id: CheckpointId,

    /// Creation time in nanoseconds since the Unix epoch.
    /// Stamped by the saver on `put` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,

    /// The values of the channels at the time of the checkpoint
    #[serde(default)]
    pub channel_values: HashMap<String, Value>,

    /// The versions of the channels at the time of the checkpoint
    #[serde(default)]
    pub channel_versions: ChannelVersions,

    /// Map from node ID to map from channel name to version seen
    #[serde(default)]
    pub versions_seen: HashMap<String, ChannelVersions>,

    /// The channels that were updated in this checkpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_channels: Option<Vec<String>>,
}

impl Checkpoint {
    /// Current checkpoint format version
    pub const CURRENT_VERSION: i32 = 1;

    /// Create a new checkpoint with the given id and channel values
    pub fn new(id: impl Into<CheckpointId>, channel_values: HashMap<String, Value>) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: id.into(),
            ts: None,
            channel_values,
            channel_versions: HashMap::new(),
            versions_seen: HashMap::new(),
            updated_channels: None,
        }
    }

    /// Create an empty checkpoint with a random id
    pub fn empty() -> Self {
        Self::new(Uuid::new_v4().to_string(), HashMap::new())
    }

    /// Set the timestamp (nanoseconds since the Unix epoch)
    pub fn with_ts(mut self, ts: i64) -> Self {
        self.ts = Some(ts);
        self
    }

    /// Set the channel versions
    pub fn with_channel_versions(mut self, versions: ChannelVersions) -> Self {
        self.channel_versions = versions;
        self
    }

    /// Creation time as a UTC datetime, if stamped
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.ts.map(DateTime::from_timestamp_nanos)
    }
}

/// `extra` key under which [`CheckpointSaver::put`](crate::traits::CheckpointSaver::put)
/// reports the stored checkpoint's timestamp
pub const CHECKPOINT_TS: &str = "checkpoint_ts";

/// Configuration for checkpoint operations
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointConfig {
    /// Thread ID for grouping related checkpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Checkpoint namespace within the thread; `None` is the empty namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_ns: Option<String>,

    /// Specific checkpoint ID to address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<CheckpointId>,

    /// Metadata merged into the stored checkpoint metadata on `put`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,

    /// Additional configuration
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

impl CheckpointConfig {
    /// Create a new checkpoint configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the thread ID
    pub fn with_thread_id(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Set the checkpoint ID
    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<CheckpointId>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }

    /// Set the checkpoint namespace
    pub fn with_checkpoint_ns(mut self, checkpoint_ns: impl Into<String>) -> Self {
        self.checkpoint_ns = Some(checkpoint_ns.into());
        self
    }

    /// Add a metadata entry to merge on `put`
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Namespace, defaulting to the empty string
    pub fn namespace(&self) -> &str {
        self.checkpoint_ns.as_deref().unwrap_or("")
    }

    /// Timestamp (ns) of the checkpoint this config was returned for by `put`
    pub fn checkpoint_ts(&self) -> Option<i64> {
        self.extra.get(CHECKPOINT_TS).and_then(Value::as_i64)
    }
}

/// A tuple containing a checkpoint and its associated data
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointTuple {
    /// Configuration for this checkpoint (always carries the resolved checkpoint id)
    pub config: CheckpointConfig,

    /// The checkpoint itself
    pub checkpoint: Checkpoint,

    /// Metadata associated with the checkpoint
    pub metadata: CheckpointMetadata,

    /// Parent configuration (if any)
    pub parent_config: Option<CheckpointConfig>,

    /// Writes recorded against this checkpoint that are not folded into it yet
    pub pending_writes: Vec<PendingWrite>,
}

impl CheckpointTuple {
    /// Create a new checkpoint tuple
    pub fn new(
        config: CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Self {
        Self {
            config,
            checkpoint,
            metadata,
            parent_config: None,
            pending_writes: Vec::new(),
        }
    }

    /// Set the parent configuration
    pub fn with_parent_config(mut self, parent_config: CheckpointConfig) -> Self {
        self.parent_config = Some(parent_config);
        self
    }

    /// Set the pending writes
    pub fn with_pending_writes(mut self, pending_writes: Vec<PendingWrite>) -> Self {
        self.pending_writes = pending_writes;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_creation() {
        let checkpoint = Checkpoint::empty();
        assert_eq!(checkpoint.v, Checkpoint::CURRENT_VERSION);
        assert!(!checkpoint.id.is_empty());
        assert!(checkpoint.ts.is_none());
        assert!(checkpoint.channel_values.is_empty());
    }

    #[test]
    fn test_checkpoint_metadata() {
        let metadata = CheckpointMetadata::new()
            .with_source(CheckpointSource::Input)
            .with_step(-1)
            .with_extra("key", json!("value"));

        assert_eq!(metadata.source, Some(CheckpointSource::Input));
        assert_eq!(metadata.step, Some(-1));
        assert_eq!(metadata.extra.get("key"), Some(&json!("value")));
    }

    #[test]
    fn test_metadata_extra_is_flattened() {
        let metadata = CheckpointMetadata::new()
            .with_source(CheckpointSource::Loop)
            .with_extra("user_id", json!("u1"));

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value, json!({"source": "loop", "user_id": "u1"}));
    }

    #[test]
    fn test_checkpoint_config() {
        let config = CheckpointConfig::new()
            .with_thread_id("thread-1")
            .with_checkpoint_id("checkpoint-1");

        assert_eq!(config.thread_id, Some("thread-1".to_string()));
        assert_eq!(config.checkpoint_id, Some("checkpoint-1".to_string()));
        assert_eq!(config.namespace(), "");
    }

    #[test]
    fn test_checkpoint_without_ts_deserializes() {
        let checkpoint: Checkpoint =
            serde_json::from_value(json!({"v": 1, "id": "c1", "channel_values": {"x": 1}}))
                .unwrap();
        assert_eq!(checkpoint.ts, None);
        assert_eq!(checkpoint.channel_values["x"], json!(1));
    }

    #[test]
    fn test_channel_versions_keep_their_shape() {
        let checkpoint = Checkpoint::new("c1", HashMap::new()).with_channel_versions(HashMap::from([
            ("messages".to_string(), ChannelVersion::Int(3)),
            ("ratio".to_string(), ChannelVersion::Float(1.5)),
            ("tag".to_string(), ChannelVersion::String("v7".into())),
        ]));

        let value = serde_json::to_value(&checkpoint).unwrap();
        assert_eq!(value["channel_versions"], json!({"messages": 3, "ratio": 1.5, "tag": "v7"}));
        let back: Checkpoint = serde_json::from_value(value).unwrap();
        assert_eq!(back, checkpoint);
    }

    #[test]
    fn test_created_at_from_nanos() {
        let checkpoint = Checkpoint::empty().with_ts(1_700_000_000_000_000_000);
        let created = checkpoint.created_at().unwrap();
        assert_eq!(created.timestamp(), 1_700_000_000);
    }
}
