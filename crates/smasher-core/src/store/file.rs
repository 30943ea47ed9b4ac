//! File-backed store
//!
//! All keys live in a single JSON object on disk (`store.json` in the data
//! directory by default). Every write rewrites the whole file using an
//! atomic write (write to temp file, then rename) so a crash never leaves a
//! half-written store behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use super::{KeyValueStore, StorageError, StorageResult};
use crate::config::Config;

/// Store persisted as one JSON document
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes file rewrites so updates to different keys don't clobber each other
    io: Mutex<()>,
}

impl FileStore {
    /// Create a store backed by the file at `path`
    ///
    /// The file is created lazily on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io: Mutex::new(()),
        }
    }

    /// Create a store at the configured location
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.store_path())
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the backing file exists
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    async fn read_map(&self) -> StorageResult<Map<String, Value>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(StorageError::reading(e, self.path.clone())),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StorageError::InvalidFormat {
                path: self.path.clone(),
                details: "top-level value is not a JSON object".to_string(),
            }),
            Err(e) => Err(StorageError::InvalidFormat {
                path: self.path.clone(),
                details: e.to_string(),
            }),
        }
    }

    async fn write_map(&self, map: &Map<String, Value>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        atomic_write(&self.path, &bytes).await?;
        debug!("Wrote {} bytes to {:?}", bytes.len(), self.path);
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        let _io = self.io.lock().await;
        let mut map = self.read_map().await?;
        Ok(map.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        let _io = self.io.lock().await;
        let mut map = self.read_map().await?;
        map.insert(key.to_string(), value);
        self.write_map(&map).await
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let _io = self.io.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(key).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
async fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| StorageError::CreateDirectory {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
    }

    let temp_path = path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| StorageError::writing(e, temp_path.clone()))?;

    file.write_all(data)
        .await
        .map_err(|e| StorageError::writing(e, temp_path.clone()))?;

    file.sync_all()
        .await
        .map_err(|e| StorageError::writing(e, temp_path.clone()))?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|source| StorageError::AtomicWriteFailed {
            from: temp_path.clone(),
            to: path.to_path_buf(),
            source,
        })?;

    Ok(())
}
