use crate::core::Result;
use async_trait::async_trait;

/// Key/value byte store the settings live in.
///
/// The store only ever touches one key. `read` returns `Ok(None)` when the
/// key has never been written.
#[async_trait]
pub trait StateBackend: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
}
