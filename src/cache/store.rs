//! Byte store abstraction
//!
//! The engine persists artifacts and the manifest through this trait:
//! - `FsStore`: one file per key in a cache root directory
//! - `MemoryStore`: in-process map, for tests and embedding

use crate::error::{StepCacheError, StepCacheResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Durable key to bytes mapping scoped to one cache root
#[async_trait]
pub trait ByteStore: Send + Sync {
    /// Check whether a key exists
    async fn exists(&self, key: &str) -> StepCacheResult<bool>;

    /// Read the bytes stored under a key
    async fn read(&self, key: &str) -> StepCacheResult<Vec<u8>>;

    /// Store bytes under a key, replacing any previous value
    async fn write(&self, key: &str, bytes: &[u8]) -> StepCacheResult<()>;

    /// Remove a key; removing a missing key is not an error
    async fn delete(&self, key: &str) -> StepCacheResult<()>;

    /// All keys, in lexicographic order
    async fn list_keys(&self) -> StepCacheResult<Vec<String>>;

    /// Human-readable location for diagnostics
    fn describe(&self) -> String;
}

/// File-system store rooted at a directory
///
/// Writes go to a hidden temp file that is renamed into place, so readers
/// never observe a partially written artifact or manifest.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store, creating the root directory if absent
    pub async fn open(root: impl Into<PathBuf>) -> StepCacheResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            StepCacheError::storage(format!("creating cache root {}", root.display()), e)
        })?;
        debug!("Opened cache root {}", root.display());
        Ok(Self { root })
    }

    /// Root directory of this store
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Size in bytes of the entry under a key
    pub async fn size_of(&self, key: &str) -> StepCacheResult<u64> {
        let path = self.path_for(key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StepCacheError::storage(format!("inspecting {}", path.display()), e))?;
        Ok(meta.len())
    }

    fn path_for(&self, key: &str) -> StepCacheResult<PathBuf> {
        let single_component = !key.is_empty()
            && !key.starts_with('.')
            && Path::new(key).components().count() == 1
            && !key.contains(['/', '\\']);
        if !single_component {
            return Err(StepCacheError::storage(
                format!("rejecting store key '{key}'"),
                io::Error::new(io::ErrorKind::InvalidInput, "key is not a single file name"),
            ));
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ByteStore for FsStore {
    async fn exists(&self, key: &str) -> StepCacheResult<bool> {
        let path = self.path_for(key)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| StepCacheError::storage(format!("probing {}", path.display()), e))
    }

    async fn read(&self, key: &str) -> StepCacheResult<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path)
            .await
            .map_err(|e| StepCacheError::storage(format!("reading {}", path.display()), e))
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> StepCacheResult<()> {
        let path = self.path_for(key)?;
        let tmp = self.root.join(format!(".{key}.tmp.{}", Uuid::new_v4().simple()));

        fs::write(&tmp, bytes)
            .await
            .map_err(|e| StepCacheError::storage(format!("writing {}", tmp.display()), e))?;

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StepCacheError::storage(
                format!("renaming {} -> {}", tmp.display(), path.display()),
                e,
            ));
        }

        debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StepCacheResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StepCacheError::storage(
                format!("deleting {}", path.display()),
                e,
            )),
        }
    }

    async fn list_keys(&self) -> StepCacheResult<Vec<String>> {
        let mut keys = vec![];
        let mut entries = fs::read_dir(&self.root).await.map_err(|e| {
            StepCacheError::storage(format!("reading cache root {}", self.root.display()), e)
        })?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StepCacheError::storage("reading cache root entry", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StepCacheError::storage("inspecting cache root entry", e))?;
            if !file_type.is_file() {
                continue;
            }
            // Skip temp files and anything that is not valid UTF-8
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    keys.push(name.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ByteStore for MemoryStore {
    async fn exists(&self, key: &str) -> StepCacheResult<bool> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn read(&self, key: &str) -> StepCacheResult<Vec<u8>> {
        self.entries.read().await.get(key).cloned().ok_or_else(|| {
            StepCacheError::storage(
                format!("reading {key}"),
                io::Error::new(io::ErrorKind::NotFound, "no such key"),
            )
        })
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> StepCacheResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StepCacheResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> StepCacheResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
