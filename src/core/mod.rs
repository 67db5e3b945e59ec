pub mod error;
pub mod types;

pub use error::{CorruptStateError, DecodeError, Result, StoreError};
pub use types::{RawState, ValueKind, present};
