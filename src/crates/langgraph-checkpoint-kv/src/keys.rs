//! Record key derivation
//!
//! Every record the saver writes lives under a key built from the scope
//! (`thread_id`, `checkpoint_ns`) and, for per-checkpoint records, the
//! checkpoint id:
//!
//! ```text
//! set_checkpoints  "{thread_id}|{checkpoint_ns}|{checkpoint_id}"   checkpoint record
//! set_writes       "{thread_id}|{checkpoint_ns}|{checkpoint_id}"   write ledger
//! set_meta         "{thread_id}|{checkpoint_ns}|__latest__"        latest pointer
//! set_meta         "{thread_id}|{checkpoint_ns}|__timeline__"      timeline
//! ```
//!
//! Keys stay collision-free because `|` is rejected inside every identifier and
//! the two reserved suffixes are rejected as checkpoint ids.

use crate::checkpoint::CheckpointConfig;
use crate::error::{CheckpointError, Result};
use crate::record::RecordKey;

/// Separator between key components
pub const SEP: char = '|';

/// Suffix of the per-scope latest pointer record
pub const LATEST_TOKEN: &str = "__latest__";

/// Suffix of the per-scope timeline record
pub const TIMELINE_TOKEN: &str = "__timeline__";

/// A validated (thread, namespace) pair identifying one checkpoint history
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    thread_id: String,
    checkpoint_ns: String,
}

impl Scope {
    /// Build a scope, rejecting identifiers that would produce ambiguous keys
    pub fn new(thread_id: impl Into<String>, checkpoint_ns: impl Into<String>) -> Result<Self> {
        let thread_id = thread_id.into();
        let checkpoint_ns = checkpoint_ns.into();

        if thread_id.is_empty() {
            return Err(CheckpointError::Invalid("thread_id is required".to_string()));
        }
        reject_separator("thread_id", &thread_id)?;
        reject_separator("checkpoint_ns", &checkpoint_ns)?;

        Ok(Self {
            thread_id,
            checkpoint_ns,
        })
    }

    /// Extract the scope from a config; a missing namespace is the empty namespace
    pub fn from_config(config: &CheckpointConfig) -> Result<Self> {
        let thread_id = config
            .thread_id
            .as_deref()
            .ok_or_else(|| CheckpointError::Invalid("thread_id is required".to_string()))?;
        Self::new(thread_id, config.namespace())
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn checkpoint_ns(&self) -> &str {
        &self.checkpoint_ns
    }

    /// Config addressing `checkpoint_id` within this scope
    pub fn config_for(&self, checkpoint_id: &str) -> CheckpointConfig {
        CheckpointConfig::new()
            .with_thread_id(self.thread_id.clone())
            .with_checkpoint_ns(self.checkpoint_ns.clone())
            .with_checkpoint_id(checkpoint_id)
    }

    fn user_key(&self, suffix: &str) -> String {
        format!(
            "{}{SEP}{}{SEP}{}",
            self.thread_id, self.checkpoint_ns, suffix
        )
    }
}

/// Reject checkpoint ids that are empty, contain the separator, or collide
/// with a reserved per-scope record suffix
pub fn validate_checkpoint_id(checkpoint_id: &str) -> Result<()> {
    if checkpoint_id.is_empty() {
        return Err(CheckpointError::Invalid(
            "checkpoint_id is required".to_string(),
        ));
    }
    reject_separator("checkpoint_id", checkpoint_id)?;
    if checkpoint_id == LATEST_TOKEN || checkpoint_id == TIMELINE_TOKEN {
        return Err(CheckpointError::Invalid(format!(
            "checkpoint_id {} is reserved",
            checkpoint_id
        )));
    }
    Ok(())
}

fn reject_separator(field: &str, value: &str) -> Result<()> {
    if value.contains(SEP) {
        return Err(CheckpointError::Invalid(format!(
            "{} must not contain '{}': {}",
            field, SEP, value
        )));
    }
    Ok(())
}

/// Backend namespace and set names under which records are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    pub namespace: String,
    pub set_checkpoints: String,
    pub set_writes: String,
    pub set_meta: String,
}

impl KeySpace {
    pub fn checkpoint(&self, scope: &Scope, checkpoint_id: &str) -> RecordKey {
        RecordKey::new(
            &self.namespace,
            &self.set_checkpoints,
            scope.user_key(checkpoint_id),
        )
    }

    pub fn writes(&self, scope: &Scope, checkpoint_id: &str) -> RecordKey {
        RecordKey::new(&self.namespace, &self.set_writes, scope.user_key(checkpoint_id))
    }

    pub fn latest(&self, scope: &Scope) -> RecordKey {
        RecordKey::new(&self.namespace, &self.set_meta, scope.user_key(LATEST_TOKEN))
    }

    pub fn timeline(&self, scope: &Scope) -> RecordKey {
        RecordKey::new(&self.namespace, &self.set_meta, scope.user_key(TIMELINE_TOKEN))
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self {
            namespace: "test".to_string(),
            set_checkpoints: "lg_cp".to_string(),
            set_writes: "lg_cp_w".to_string(),
            set_meta: "lg_cp_meta".to_string(),
        }
    }
}
