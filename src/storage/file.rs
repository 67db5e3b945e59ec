use super::StateBackend;
use crate::core::{Result, StoreError};
use async_trait::async_trait;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Backend that stores each key as one file inside a directory.
///
/// Writes go to a temporary file in the same directory and are renamed over
/// the target, so a crash never leaves a half-written record behind.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds `key`. Characters unsafe in file names become `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.state", file_name))
    }
}

fn write_atomic(dir: &Path, target: &Path, bytes: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl StateBackend for FileBackend {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::ReadFailure(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || {
            write_atomic(&dir, &path, &bytes).map_err(|e| {
                StoreError::WriteFailure(format!("Failed to write '{}': {}", path.display(), e))
            })
        })
        .await
        .map_err(|e| StoreError::WriteFailure(format!("writer task failed: {}", e)))?
    }
}
