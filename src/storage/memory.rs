use super::StateBackend;
use crate::core::{Result, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Backend that keeps everything in process memory.
///
/// Counts writes and can be told to fail, which makes it the backend of
/// choice for exercising the store's recovery paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a key, as if an earlier session had written it.
    pub fn with_entry(key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.to_string(), bytes.into());
        Self {
            entries: RwLock::new(entries),
            ..Self::default()
        }
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.read().await.get(key).cloned()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::ReadFailure(format!("read of '{}' rejected", key)));
        }
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteFailure(format!("write of '{}' rejected", key)));
        }
        self.entries.write().await.insert(key.to_string(), bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_missing_key() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.read("new-tab-data").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let backend = MemoryBackend::new();
        backend.write("k", b"{}".to_vec()).await.unwrap();
        assert_eq!(backend.read("k").await.unwrap(), Some(b"{}".to_vec()));
        assert_eq!(backend.write_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let backend = MemoryBackend::with_entry("k", "{}");
        backend.set_fail_reads(true);
        assert!(matches!(backend.read("k").await, Err(StoreError::ReadFailure(_))));

        backend.set_fail_writes(true);
        assert!(matches!(
            backend.write("k", Vec::new()).await,
            Err(StoreError::WriteFailure(_))
        ));
        assert_eq!(backend.write_count(), 0);
        assert_eq!(backend.get("k").await, Some(b"{}".to_vec()));
    }
}
