//! Per-scope pointer to the most recently written checkpoint

use crate::error::Result;
use crate::keys::{KeySpace, Scope};
use crate::record::{Backend, Bin, Record};

const CHECKPOINT_ID_FIELD: &str = "checkpoint_id";
const TS_FIELD: &str = "ts";

/// Id and timestamp of the latest checkpoint in a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestRef {
    pub checkpoint_id: String,
    pub ts: i64,
}

#[derive(Clone)]
pub(crate) struct LatestPointer {
    backend: Backend,
    keys: KeySpace,
}

impl LatestPointer {
    pub(crate) fn new(backend: Backend, keys: KeySpace) -> Self {
        Self { backend, keys }
    }

    /// The pointer, or `None` if absent or unreadable
    pub(crate) async fn read(&self, scope: &Scope) -> Result<Option<LatestRef>> {
        let key = self.keys.latest(scope);
        let Some(record) = self.backend.get(&key).await? else {
            return Ok(None);
        };
        let Some(checkpoint_id) = record.get(CHECKPOINT_ID_FIELD).and_then(Bin::as_str) else {
            tracing::warn!(%key, "latest pointer without checkpoint_id, ignoring");
            return Ok(None);
        };
        Ok(Some(LatestRef {
            checkpoint_id: checkpoint_id.to_string(),
            ts: record.get(TS_FIELD).and_then(Bin::as_int).unwrap_or_default(),
        }))
    }

    /// Point the scope at `checkpoint_id`.
    ///
    /// This is an unconditional overwrite: an older checkpoint written last
    /// becomes the latest.
    pub(crate) async fn record(&self, scope: &Scope, checkpoint_id: &str, ts: i64) -> Result<()> {
        let key = self.keys.latest(scope);
        let mut record = Record::new();
        record.insert(CHECKPOINT_ID_FIELD.to_string(), Bin::from(checkpoint_id));
        record.insert(TS_FIELD.to_string(), Bin::Int(ts));
        self.backend.put(&key, record).await?;

        tracing::debug!(%key, checkpoint_id, ts, "latest pointer updated");
        Ok(())
    }
}
