use thiserror::Error;

use super::types::ValueKind;

/// Persisted bytes that cannot be turned back into a [`RawState`](super::RawState).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("persisted settings are empty")]
    Empty,

    #[error("persisted settings are malformed: {0}")]
    Malformed(String),

    #[error("persisted settings are a {0}, expected a mapping")]
    NotAMapping(ValueKind),
}

/// A known field is present but holds a value of the wrong kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("field '{field}' expects {expected}, found {found}")]
pub struct CorruptStateError {
    pub field: String,
    pub expected: &'static str,
    pub found: ValueKind,
}

impl CorruptStateError {
    pub fn new(field: impl Into<String>, expected: &'static str, found: ValueKind) -> Self {
        Self {
            field: field.into(),
            expected,
            found,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    CorruptState(#[from] CorruptStateError),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Backend read failed: {0}")]
    ReadFailure(String),

    #[error("Backend write failed: {0}")]
    WriteFailure(String),

    #[error("Invalid migration chain: {0}")]
    InvalidMigration(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Persistence writer stopped")]
    WriterStopped,
}

pub type Result<T> = std::result::Result<T, StoreError>;
