use super::{StateCodec, into_mapping};
use crate::core::{DecodeError, RawState, Result, StoreError};
use serde_json::Value;

/// Compact binary encoding for hosts that store raw bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessagePackCodec;

impl StateCodec for MessagePackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode(&self, raw: &RawState) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(raw)
            .map_err(|e| StoreError::Encode(format!("Failed to serialize settings: {}", e)))
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<RawState, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let value: Value = rmp_serde::from_slice(bytes)
            .map_err(|e| DecodeError::Malformed(format!("Failed to deserialize settings: {}", e)))?;
        into_mapping(value)
    }
}
