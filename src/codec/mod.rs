//! Byte encodings for persisted settings records.

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MessagePackCodec;

use crate::core::{DecodeError, RawState, Result, StoreError, ValueKind};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Turns records into bytes and back.
///
/// `decode` never panics on hostile input; every failure is a [`DecodeError`].
pub trait StateCodec: Send + Sync {
    fn name(&self) -> &'static str;

    fn encode(&self, raw: &RawState) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> std::result::Result<RawState, DecodeError>;
}

/// Selects one of the built-in codecs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecKind {
    #[default]
    Json,
    MessagePack,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn StateCodec> {
        match self {
            Self::Json => Arc::new(JsonCodec),
            Self::MessagePack => Arc::new(MessagePackCodec),
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::MessagePack => f.write_str("msgpack"),
        }
    }
}

impl FromStr for CodecKind {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "msgpack" | "messagepack" => Ok(Self::MessagePack),
            other => Err(StoreError::InvalidConfig(format!("unknown codec '{}'", other))),
        }
    }
}

/// Shared tail of every decoder: the document must be a mapping.
fn into_mapping(value: Value) -> std::result::Result<RawState, DecodeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(DecodeError::NotAMapping(ValueKind::of(&other))),
    }
}
