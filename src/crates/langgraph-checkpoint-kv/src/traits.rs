//! Checkpoint saver trait
//!
//! This module defines **[`CheckpointSaver`]**, the interface an execution-graph
//! engine uses to persist and restore its state. The crate ships one
//! implementation, [`KvCheckpointSaver`](crate::saver::KvCheckpointSaver), which
//! runs on top of any [`RecordStore`](crate::record::RecordStore).
//!
//! # Overview
//!
//! A saver stores successive snapshots ("checkpoints") of a thread's execution
//! state and lets callers:
//!
//! - **Resume** - load the latest checkpoint of a thread
//! - **Time-travel** - load any specific checkpoint by id
//! - **Browse history** - stream checkpoints newest first, with pagination and
//!   metadata filtering
//! - **Buffer task output** - attach pending writes to a checkpoint before they
//!   are folded into the next one
//!
//! # Addressing
//!
//! Every operation is addressed by a [`CheckpointConfig`]:
//!
//! | Field | Role |
//! |-------|------|
//! | `thread_id` | Required. The logical run or conversation |
//! | `checkpoint_ns` | Optional sub-graph namespace; missing means `""` |
//! | `checkpoint_id` | A specific checkpoint; missing means "latest" on reads |
//!
//! `(thread_id, checkpoint_ns)` is a *scope*: histories in different scopes are
//! fully independent.
//!
//! # Call Pattern
//!
//! ```text
//! 1. get_tuple(config)            resume from latest
//! 2. tasks run, each calls
//!    put_writes(config, ...)      buffer task outputs
//! 3. put(config, checkpoint, ...) persist the next snapshot
//! 4. repeat from 2
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use langgraph_checkpoint_kv::{
//!     Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver,
//!     InMemoryRecordStore, KvCheckpointSaver,
//! };
//! use futures::StreamExt;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let saver = KvCheckpointSaver::new(Arc::new(InMemoryRecordStore::new()));
//! let config = CheckpointConfig::new().with_thread_id("session-1");
//!
//! let saved = saver
//!     .put(&config, Checkpoint::empty(), CheckpointMetadata::new().with_step(0), HashMap::new())
//!     .await?;
//!
//! let latest = saver.get_tuple(&config).await?.expect("just written");
//! assert_eq!(Some(latest.checkpoint.id), saved.checkpoint_id);
//!
//! let mut history = saver.list(Some(&config), None, None, None).await?;
//! while let Some(tuple) = history.next().await {
//!     println!("{}", tuple?.checkpoint.id);
//! }
//! ```
//!
//! # Error Handling
//!
//! - Missing or malformed identifiers are [`CheckpointError::Invalid`](crate::CheckpointError::Invalid)
//! - Backend failures are [`CheckpointError::Storage`](crate::CheckpointError::Storage)
//! - A `put` whose checkpoint was stored but whose index update failed is
//!   [`CheckpointError::PartialWrite`](crate::CheckpointError::PartialWrite)
//! - Absent or undecodable checkpoints are `Ok(None)`, never errors

use crate::{
    checkpoint::{
        ChannelVersions, Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointTuple,
    },
    error::Result,
};
use async_trait::async_trait;
use futures::stream::Stream;
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;

/// Type alias for async stream of checkpoint tuples
pub type CheckpointStream =
    Pin<Box<dyn Stream<Item = Result<CheckpointTuple>> + Send + 'static>>;

/// Core trait for checkpoint storage backends
///
/// Implementations must be thread-safe (`Send + Sync`) to support concurrent
/// graph executions. Only `get_tuple`, `list`, `put` and `put_writes` are
/// required.
#[async_trait]
pub trait CheckpointSaver: Send + Sync {
    /// Fetch a checkpoint using the given configuration
    ///
    /// # Returns
    ///
    /// The requested checkpoint, or `None` if not found
    async fn get(&self, config: &CheckpointConfig) -> Result<Option<Checkpoint>> {
        if let Some(tuple) = self.get_tuple(config).await? {
            Ok(Some(tuple.checkpoint))
        } else {
            Ok(None)
        }
    }

    /// Retrieve a complete checkpoint tuple with metadata and pending writes.
    ///
    /// # Arguments
    ///
    /// * `config` - Which checkpoint to retrieve:
    ///   - If `checkpoint_id` is provided: that specific checkpoint
    ///   - Otherwise: the **latest** checkpoint written in the scope
    ///
    /// # Returns
    ///
    /// - `Ok(Some(CheckpointTuple))` - Checkpoint found and decoded
    /// - `Ok(None)` - Nothing stored for the config, or the stored record is unreadable
    /// - `Err` - Invalid config or backend failure
    ///
    /// The returned tuple carries:
    /// - `config` - The resolved config (with the real `checkpoint_id`)
    /// - `checkpoint` - The stored snapshot
    /// - `metadata` - The stored metadata
    /// - `parent_config` - The parent checkpoint, if one was recorded
    /// - `pending_writes` - `(task_id, channel, value)` triples attached to the checkpoint
    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>>;

    /// Stream the checkpoints of a scope, newest first.
    ///
    /// # Arguments
    ///
    /// * `config` - The scope to list. A `thread_id` is required.
    /// * `filter` - Metadata fields that must all be present with equal values
    /// * `before` - Pagination cursor: only checkpoints older than
    ///   `before.checkpoint_id` are returned. An id that is not in the scope's
    ///   history yields an empty stream.
    /// * `limit` - Maximum number of checkpoints to yield
    ///
    /// # Returns
    ///
    /// A lazy stream: each checkpoint is resolved only when the consumer polls
    /// for it, so dropping the stream early avoids further backend reads.
    ///
    /// # Paginated history browsing
    ///
    /// ```rust,ignore
    /// let page1: Vec<_> = saver.list(Some(&config), None, None, Some(10)).await?
    ///     .try_collect().await?;
    ///
    /// let cursor = &page1.last().expect("non-empty page").config;
    /// let page2: Vec<_> = saver.list(Some(&config), None, Some(cursor), Some(10)).await?
    ///     .try_collect().await?;
    /// ```
    async fn list(
        &self,
        config: Option<&CheckpointConfig>,
        filter: Option<HashMap<String, Value>>,
        before: Option<&CheckpointConfig>,
        limit: Option<usize>,
    ) -> Result<CheckpointStream>;

    /// Store a checkpoint with its configuration and metadata.
    ///
    /// # Arguments
    ///
    /// * `config` - Where to store it:
    ///   - `thread_id` - Required
    ///   - `checkpoint_ns` - Optional namespace
    ///   - `checkpoint_id` - The **parent** checkpoint (the one this run resumed from)
    ///   - `metadata` - Merged into `metadata`, overriding keys it shares
    /// * `checkpoint` - The snapshot; `checkpoint.id` is required. A missing
    ///   `ts` is stamped at write time.
    /// * `metadata` - Execution metadata (step, source, custom fields)
    /// * `new_versions` - Channel versions updated in this step
    ///
    /// # Returns
    ///
    /// The config addressing the stored checkpoint. Its
    /// [`checkpoint_ts()`](CheckpointConfig::checkpoint_ts) carries the timestamp
    /// that was stored, including one stamped by the saver.
    ///
    /// Storing an id that already exists in the scope overwrites it in place.
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
        new_versions: ChannelVersions,
    ) -> Result<CheckpointConfig>;

    /// Store intermediate writes linked to a checkpoint.
    ///
    /// # Arguments
    ///
    /// * `config` - The checkpoint the writes belong to. Without a
    ///   `checkpoint_id` the call does nothing.
    /// * `writes` - `(channel, value)` pairs produced by one task
    /// * `task_id` - The producing task
    /// * `task_path` - Free-form grouping string for the task
    ///
    /// Writing the same `(task_id, slot)` twice keeps only the newer value.
    async fn put_writes(
        &self,
        config: &CheckpointConfig,
        writes: Vec<(String, Value)>,
        task_id: &str,
        task_path: &str,
    ) -> Result<()>;
}
