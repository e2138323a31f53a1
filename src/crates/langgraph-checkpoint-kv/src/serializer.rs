//! Serialization protocol for checkpoint payloads
//!
//! Payloads are stored as a `(type tag, bytes)` pair so a reader can pick the
//! matching decoder without guessing. The saver only ever hands
//! [`serde_json::Value`]s to the protocol; typed structs are converted at the
//! edges.

use crate::error::{CheckpointError, Result};
use serde_json::Value;

/// Protocol for serializing and deserializing checkpoint data
///
/// Implementations can provide custom serialization strategies
/// (JSON, MessagePack, compressed JSON, etc.) as long as
/// `loads_typed(dumps_typed(v)) == v`.
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value into a type tag and bytes
    fn dumps_typed(&self, value: &Value) -> Result<(String, Vec<u8>)>;

    /// Deserialize bytes previously produced under `type_tag`
    fn loads_typed(&self, type_tag: &str, data: &[u8]) -> Result<Value>;
}

/// JSON-based serializer (default)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    /// Tag for JSON-encoded payloads
    pub const JSON_TAG: &'static str = "json";
    /// Tag for the null payload, which carries no bytes
    pub const NULL_TAG: &'static str = "null";

    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps_typed(&self, value: &Value) -> Result<(String, Vec<u8>)> {
        if value.is_null() {
            return Ok((Self::NULL_TAG.to_string(), Vec::new()));
        }
        Ok((Self::JSON_TAG.to_string(), serde_json::to_vec(value)?))
    }

    fn loads_typed(&self, type_tag: &str, data: &[u8]) -> Result<Value> {
        match type_tag {
            Self::NULL_TAG => Ok(Value::Null),
            Self::JSON_TAG => serde_json::from_slice(data)
                .map_err(|e| CheckpointError::Decode(format!("invalid json payload: {}", e))),
            other => Err(CheckpointError::Decode(format!(
                "unsupported type tag: {}",
                other
            ))),
        }
    }
}
