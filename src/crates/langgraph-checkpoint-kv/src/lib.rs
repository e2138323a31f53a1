//! # langgraph-checkpoint-kv - Checkpoints on a Plain Key-Value Store
//!
//! **A [`CheckpointSaver`] that needs nothing from its backend but point `get` and
//! `put`.** Graph executions persist their state after each step; this crate keeps
//! those snapshots, their pending task writes, and enough index data to answer
//! "what is the latest checkpoint?" and "show me the history" without server-side
//! queries, secondary indexes or transactions.
//!
//! ## Overview
//!
//! Everything is stored as flat records under derived keys:
//!
//! | Record | Key | Holds |
//! |--------|-----|-------|
//! | Checkpoint | `{thread}\|{ns}\|{id}` | Encoded snapshot, metadata, parent id, timestamp |
//! | Write ledger | `{thread}\|{ns}\|{id}` | Pending writes keyed by `(task_id, idx)` |
//! | Latest pointer | `{thread}\|{ns}\|__latest__` | Id and timestamp of the last stored checkpoint |
//! | Timeline | `{thread}\|{ns}\|__timeline__` | Bounded, deduplicated `[ts, id]` list, newest first |
//!
//! ## Core Concepts
//!
//! ### 1. RecordStore
//!
//! [`RecordStore`] is the backend seam: `get`, `put` with an optional TTL, and an
//! optional `touch`. [`InMemoryRecordStore`] is included for tests and development.
//!
//! ### 2. KvCheckpointSaver
//!
//! [`KvCheckpointSaver`] implements [`CheckpointSaver`] on any record store:
//!
//! - **`put()`** - Store the checkpoint, then advance the latest pointer and timeline
//! - **`put_writes()`** - Merge a task's writes into the checkpoint's ledger
//! - **`get_tuple()`** - Resolve a specific or latest checkpoint with its pending writes
//! - **`list()`** - Lazily stream history, newest first, with `before`, `filter`, `limit`
//!
//! ### 3. Consistency
//!
//! The three `put` steps are separate writes. A failure after the checkpoint itself
//! is stored surfaces as [`CheckpointError::PartialWrite`]; repeating the `put`
//! repairs the indexes. Concurrent writers on the same scope race, and the last
//! write to each index record wins.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use langgraph_checkpoint_kv::{
//!     Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver,
//!     InMemoryRecordStore, KvCheckpointSaver,
//! };
//! use serde_json::json;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let saver = KvCheckpointSaver::new(Arc::new(InMemoryRecordStore::new()));
//!
//!     let config = CheckpointConfig::new().with_thread_id("thread-123");
//!     let checkpoint = Checkpoint::new("cp-1", HashMap::from([("x".to_string(), json!(1))]));
//!
//!     let saved = saver
//!         .put(&config, checkpoint, CheckpointMetadata::new(), HashMap::new())
//!         .await?;
//!     saver
//!         .put_writes(&saved, vec![("messages".to_string(), json!("hi"))], "task-1", "")
//!         .await?;
//!
//!     if let Some(tuple) = saver.get_tuple(&config).await? {
//!         println!("latest: {} with {} pending writes", tuple.checkpoint.id, tuple.pending_writes.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! [`SaverConfig`] selects the backend namespace and set names, the record TTL,
//! the timeline capacity and the special-channel table. It can be loaded from
//! environment variables with [`SaverConfig::from_env_with_defaults`].
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` for each stored record and `warn`
//! for partial writes, skipped unreadable data and failed TTL refreshes. It never
//! installs a subscriber.

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod error;
pub mod keys;
mod latest;
pub mod memory;
pub mod record;
pub mod saver;
pub mod serializer;
mod timeline;
pub mod traits;
pub mod writes;

// Re-export main types
pub use checkpoint::{
    ChannelVersion, ChannelVersions, Checkpoint, CheckpointConfig, CheckpointId,
    CheckpointMetadata, CheckpointSource, CheckpointTuple, PendingWrite, CHECKPOINT_TS,
};
pub use config::{SaverConfig, TtlConfig};
pub use error::{CheckpointError, PutStage, Result};
pub use memory::InMemoryRecordStore;
pub use record::{Bin, Record, RecordKey, RecordStore};
pub use saver::KvCheckpointSaver;
pub use serializer::{JsonSerializer, SerializerProtocol};
pub use traits::{CheckpointSaver, CheckpointStream};
pub use writes::SpecialChannels;
