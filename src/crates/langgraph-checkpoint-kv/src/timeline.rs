//! Per-scope timeline of checkpoint ids, newest first
//!
//! The timeline is the only history index the saver has: the backend cannot
//! sort or scan, so `list` walks this record instead. It is stored as one
//! record holding a JSON list of `[ts, checkpoint_id]` pairs.
//!
//! Invariants kept by [`TimelineIndex::record`]:
//! - at most one entry per checkpoint id (re-recording moves the id to the head)
//! - at most `max_len` entries (the oldest positions are dropped first)
//!
//! `record` is a read-modify-write of the whole list and is not atomic against
//! concurrent writers on the same scope; the last full replace wins.

use crate::error::Result;
use crate::keys::{KeySpace, Scope};
use crate::record::{json_items_record, read_json_items, Backend};
use serde_json::{json, Value};

const ITEMS_FIELD: &str = "items";

/// One timeline position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub ts: i64,
    pub checkpoint_id: String,
}

impl TimelineEntry {
    fn from_json(item: &Value) -> Option<Self> {
        let pair = item.as_array()?;
        if pair.len() != 2 {
            return None;
        }
        Some(Self {
            ts: pair[0].as_i64()?,
            checkpoint_id: pair[1].as_str()?.to_string(),
        })
    }

    fn to_json(&self) -> Value {
        json!([self.ts, self.checkpoint_id])
    }
}

/// Bounded, deduplicated recency index of a scope's checkpoints
#[derive(Clone)]
pub(crate) struct TimelineIndex {
    backend: Backend,
    keys: KeySpace,
    max_len: usize,
}

impl TimelineIndex {
    pub(crate) fn new(backend: Backend, keys: KeySpace, max_len: usize) -> Self {
        Self {
            backend,
            keys,
            max_len: max_len.max(1),
        }
    }

    /// Current entries, newest first. Missing or malformed records read as empty;
    /// individual malformed entries are skipped.
    pub(crate) async fn read(&self, scope: &Scope) -> Result<Vec<TimelineEntry>> {
        let key = self.keys.timeline(scope);
        let record = self.backend.get(&key).await?;
        let items = read_json_items(record.as_ref(), ITEMS_FIELD, &key);
        let total = items.len();
        let entries: Vec<TimelineEntry> =
            items.iter().filter_map(TimelineEntry::from_json).collect();
        if entries.len() < total {
            tracing::warn!(
                %key,
                skipped = total - entries.len(),
                "skipped malformed timeline entries"
            );
        }
        Ok(entries)
    }

    /// Move `checkpoint_id` to the head of the timeline and persist it
    pub(crate) async fn record(&self, scope: &Scope, ts: i64, checkpoint_id: &str) -> Result<()> {
        let mut entries = self.read(scope).await?;
        insert_at_head(&mut entries, ts, checkpoint_id, self.max_len);

        let key = self.keys.timeline(scope);
        let items: Vec<Value> = entries.iter().map(TimelineEntry::to_json).collect();
        self.backend.put(&key, json_items_record(ITEMS_FIELD, &items)?).await?;

        tracing::debug!(%key, checkpoint_id, len = items.len(), "timeline updated");
        Ok(())
    }
}

/// Remove any entry for `checkpoint_id`, prepend the new entry and cap the length
pub(crate) fn insert_at_head(
    entries: &mut Vec<TimelineEntry>,
    ts: i64,
    checkpoint_id: &str,
    max_len: usize,
) {
    entries.retain(|e| e.checkpoint_id != checkpoint_id);
    entries.insert(
        0,
        TimelineEntry {
            ts,
            checkpoint_id: checkpoint_id.to_string(),
        },
    );
    entries.truncate(max_len.max(1));
}

/// Entries strictly after `before_id`'s position; empty if `before_id` is absent
pub(crate) fn entries_after(entries: Vec<TimelineEntry>, before_id: &str) -> Vec<TimelineEntry> {
    match entries.iter().position(|e| e.checkpoint_id == before_id) {
        Some(pos) => entries.into_iter().skip(pos + 1).collect(),
        None => Vec::new(),
    }
}
