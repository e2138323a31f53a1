//! Error types for checkpoint operations

use std::fmt;

use thiserror::Error;

use crate::checkpoint::CheckpointConfig;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// The follow-up step of `put` that failed after the checkpoint record was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutStage {
    /// Advancing the per-scope latest pointer
    LatestPointer,
    /// Inserting the checkpoint into the per-scope timeline
    Timeline,
}

impl fmt::Display for PutStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PutStage::LatestPointer => f.write_str("latest pointer"),
            PutStage::Timeline => f.write_str("timeline"),
        }
    }
}

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Caller-supplied identifiers are missing or malformed
    #[error("Invalid checkpoint input: {0}")]
    Invalid(String),

    /// The record store failed a point operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// A typed payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The checkpoint record is durable, but a later index update failed.
    ///
    /// `config` references the stored checkpoint. Repeating the same `put`
    /// is safe because checkpoint records are keyed by id.
    #[error("Checkpoint {} stored but {stage} update failed: {source}", .config.checkpoint_id.as_deref().unwrap_or_default())]
    PartialWrite {
        config: CheckpointConfig,
        stage: PutStage,
        #[source]
        source: Box<CheckpointError>,
    },
}

impl CheckpointError {
    /// Whether the checkpoint itself was persisted despite this error
    pub fn is_partial_write(&self) -> bool {
        matches!(self, CheckpointError::PartialWrite { .. })
    }

    /// Reference to the checkpoint that was committed before the failure, if any
    pub fn committed_config(&self) -> Option<&CheckpointConfig> {
        match self {
            CheckpointError::PartialWrite { config, .. } => Some(config),
            _ => None,
        }
    }
}
