//! Per-checkpoint ledger of pending writes
//!
//! Tasks running between two checkpoints report their outputs through
//! `put_writes` before the engine folds them into the next checkpoint. The
//! ledger keeps those outputs in one record per checkpoint so a resumed run can
//! recover them.
//!
//! Each entry occupies a slot identified by `(task_id, idx)`. `idx` is the
//! position of the write within its `put_writes` call, unless the channel has
//! a fixed index in [`SpecialChannels`]. Writing to an occupied slot replaces
//! the entry in place; a new slot is appended.
//!
//! Finding a slot is a linear scan over the ledger, so each append costs
//! O(writes × ledger size). Ledgers are bounded by the task fan-out of a
//! single step, which keeps this cheap in practice.

use crate::checkpoint::PendingWrite;
use crate::clock::now_nanos;
use crate::error::Result;
use crate::keys::{KeySpace, Scope};
use crate::record::{json_items_record, read_json_items, Backend};
use crate::serializer::SerializerProtocol;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

const WRITES_FIELD: &str = "writes";

/// Channel carrying a task error
pub const ERROR: &str = "__error__";
/// Channel carrying scheduled follow-up work
pub const SCHEDULED: &str = "__scheduled__";
/// Channel carrying an interrupt raised by a task
pub const INTERRUPT: &str = "__interrupt__";
/// Channel carrying a resume value for an interrupted task
pub const RESUME: &str = "__resume__";

/// Channels whose writes always occupy a fixed ledger slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialChannels(HashMap<String, i64>);

impl SpecialChannels {
    /// A table with no special channels; every write uses its position
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Assign a fixed index to `channel`
    pub fn with_channel(mut self, channel: impl Into<String>, idx: i64) -> Self {
        self.0.insert(channel.into(), idx);
        self
    }

    /// The fixed index of `channel`, if it has one
    pub fn index_of(&self, channel: &str) -> Option<i64> {
        self.0.get(channel).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for SpecialChannels {
    fn default() -> Self {
        Self::empty()
            .with_channel(ERROR, -1)
            .with_channel(SCHEDULED, -2)
            .with_channel(INTERRUPT, -3)
            .with_channel(RESUME, -4)
    }
}

/// A ledger entry as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredWrite {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    task_path: String,
    channel: String,
    idx: i64,
    #[serde(rename = "type")]
    type_tag: String,
    value: Vec<u8>,
    #[serde(default)]
    ts: i64,
}

#[derive(Clone)]
pub(crate) struct WriteLedger {
    backend: Backend,
    keys: KeySpace,
    serde: Arc<dyn SerializerProtocol>,
    special_channels: SpecialChannels,
}

impl WriteLedger {
    pub(crate) fn new(
        backend: Backend,
        keys: KeySpace,
        serde: Arc<dyn SerializerProtocol>,
        special_channels: SpecialChannels,
    ) -> Self {
        Self {
            backend,
            keys,
            serde,
            special_channels,
        }
    }

    /// Merge `writes` from one task into the checkpoint's ledger
    pub(crate) async fn append(
        &self,
        scope: &Scope,
        checkpoint_id: &str,
        task_id: &str,
        task_path: &str,
        writes: &[(String, Value)],
    ) -> Result<()> {
        if writes.is_empty() {
            return Ok(());
        }

        let key = self.keys.writes(scope, checkpoint_id);
        let existing = self.backend.get(&key).await?;
        // Kept as raw JSON so entries this version cannot parse survive the rewrite.
        let mut items = read_json_items(existing.as_ref(), WRITES_FIELD, &key);
        let ts = now_nanos();
        let mut replaced = 0usize;

        for (pos, (channel, value)) in writes.iter().enumerate() {
            let idx = self
                .special_channels
                .index_of(channel)
                .unwrap_or(pos as i64);
            let (type_tag, bytes) = self.serde.dumps_typed(value)?;
            let entry = serde_json::to_value(StoredWrite {
                task_id: task_id.to_string(),
                task_path: task_path.to_string(),
                channel: channel.clone(),
                idx,
                type_tag,
                value: bytes,
                ts,
            })?;

            match items.iter().position(|item| occupies(item, task_id, idx)) {
                Some(slot) => {
                    items[slot] = entry;
                    replaced += 1;
                }
                None => items.push(entry),
            }
        }

        self.backend
            .put(&key, json_items_record(WRITES_FIELD, &items)?)
            .await?;

        tracing::debug!(
            %key,
            task_id,
            incoming = writes.len(),
            replaced,
            total = items.len(),
            "write ledger updated"
        );
        Ok(())
    }

    /// Decoded pending writes for a checkpoint, in ledger order.
    ///
    /// Entries missing required fields or failing to decode are skipped.
    pub(crate) async fn read(&self, scope: &Scope, checkpoint_id: &str) -> Result<Vec<PendingWrite>> {
        let key = self.keys.writes(scope, checkpoint_id);
        let record = self.backend.get(&key).await?;
        let items = read_json_items(record.as_ref(), WRITES_FIELD, &key);

        let mut pending = Vec::with_capacity(items.len());
        let mut skipped = 0usize;
        for item in items {
            match self.decode(item) {
                Some(write) => pending.push(write),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(%key, skipped, "skipped undecodable pending writes");
        }
        Ok(pending)
    }

    pub(crate) fn key(&self, scope: &Scope, checkpoint_id: &str) -> crate::record::RecordKey {
        self.keys.writes(scope, checkpoint_id)
    }

    fn decode(&self, item: Value) -> Option<PendingWrite> {
        let stored: StoredWrite = serde_json::from_value(item).ok()?;
        let value = self
            .serde
            .loads_typed(&stored.type_tag, &stored.value)
            .ok()?;
        Some((stored.task_id, stored.channel, value))
    }
}

fn occupies(item: &Value, task_id: &str, idx: i64) -> bool {
    item.get("task_id").and_then(Value::as_str) == Some(task_id)
        && item.get("idx").and_then(Value::as_i64) == Some(idx)
}
