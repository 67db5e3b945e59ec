use super::{StateCodec, into_mapping};
use crate::core::{DecodeError, RawState, Result};
use serde_json::Value;

/// UTF-8 JSON text, the format the page has always stored.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl StateCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, raw: &RawState) -> Result<Vec<u8>> {
        // A map of JSON values always renders.
        Ok(Value::Object(raw.clone()).to_string().into_bytes())
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<RawState, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(DecodeError::Empty);
        }
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|err| DecodeError::Malformed(err.to_string()))?;
        into_mapping(value)
    }
}
