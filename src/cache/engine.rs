//! Checkpoint engine
//!
//! Orchestrates lookup-or-compute-and-store for checkpointed calls and owns
//! every mutation of the manifest (append on first execution, truncation,
//! clearing).
//!
//! # Consistency
//!
//! - The artifact is written before the manifest is touched, so the
//!   manifest never names a checkpoint whose artifact failed to persist.
//! - Truncation and clearing save the trimmed manifest before deleting
//!   artifacts. A failed delete leaves untracked artifacts behind, never a
//!   listed checkpoint without them; `clear` removes such leftovers.
//! - Manifest read-modify-write sections hold one async mutex per cache,
//!   so concurrent tasks sharing a cache cannot lose appends or race a
//!   truncation. Nothing guards against a second process on the same root.

use crate::cache::codec::{from_canonical, to_canonical, Codec, JsonCodec};
use crate::cache::key::{derive, parse_artifact_key, validate_identity, CallArgs};
use crate::cache::manifest::Manifest;
use crate::cache::observer::{CacheEvent, CacheObserver};
use crate::cache::store::{ByteStore, FsStore};
use crate::error::{StepCacheError, StepCacheResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Outcome of a truncation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TruncateReport {
    /// Identities dropped from the manifest, in their former order
    pub removed: Vec<String>,
    /// Number of artifacts deleted
    pub artifacts: usize,
}

impl TruncateReport {
    /// True when the identity was not in the manifest
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Outcome of clearing a cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Identities the manifest listed before clearing
    pub removed: Vec<String>,
    /// Number of artifacts deleted
    pub artifacts: usize,
}

/// Checkpointing cache over a byte store
pub struct CheckpointCache {
    store: Arc<dyn ByteStore>,
    codec: Arc<dyn Codec>,
    manifest_lock: Mutex<()>,
    observers: Vec<Arc<dyn CacheObserver>>,
}

impl CheckpointCache {
    /// Open a cache rooted at a directory, creating it if absent
    pub async fn open(root: impl Into<PathBuf>) -> StepCacheResult<Self> {
        let store = FsStore::open(root).await?;
        Ok(Self::with_store(Arc::new(store)))
    }

    /// Create a cache over any store, using the JSON codec
    pub fn with_store(store: Arc<dyn ByteStore>) -> Self {
        Self {
            store,
            codec: Arc::new(JsonCodec),
            manifest_lock: Mutex::new(()),
            observers: vec![],
        }
    }

    /// Replace the codec used for keys and artifacts
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    /// Register an observer for cache events
    pub fn with_observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Underlying store
    pub fn store(&self) -> &dyn ByteStore {
        self.store.as_ref()
    }

    /// Run one checkpointed call
    ///
    /// Returns the stored result when an artifact exists for `identity` and
    /// `args`; otherwise awaits `compute`, stores its result and records
    /// `identity` in the manifest on its first execution. Errors from
    /// `compute` are returned unchanged and leave no trace in the cache.
    pub async fn run<T, E, F, Fut>(
        &self,
        identity: &str,
        args: &CallArgs,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<StepCacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        validate_identity(identity)?;
        let key = derive(self.codec.as_ref(), identity, args)?;
        let storage_key = key.artifact_key(identity, self.codec.extension());

        if self.store.exists(&storage_key).await? {
            let result = self.load_artifact(&storage_key).await?;
            info!("[{}] Loaded result from cache.", identity);
            self.notify(CacheEvent::Hit {
                identity: identity.to_string(),
                key: key.to_string(),
            })
            .await;
            return Ok(result);
        }

        let result = compute().await?;
        let bytes = self.encode_result(identity, &result)?;

        {
            let _guard = self.manifest_lock.lock().await;
            self.store.write(&storage_key, &bytes).await?;

            let mut manifest = Manifest::load(self.store.as_ref(), self.codec.extension()).await?;
            if manifest.append(identity) {
                manifest.save(self.store.as_ref()).await?;
                debug!("Recorded checkpoint {} at position {}", identity, manifest.len() - 1);
            }
        }

        info!("[{}] Computed result and saved to cache.", identity);
        self.notify(CacheEvent::Miss {
            identity: identity.to_string(),
            key: key.to_string(),
        })
        .await;
        Ok(result)
    }

    /// Remove `from` and every checkpoint after it in manifest order
    ///
    /// Truncating a checkpoint that never ran is a no-op.
    pub async fn truncate(&self, from: &str) -> StepCacheResult<TruncateReport> {
        let _guard = self.manifest_lock.lock().await;
        let extension = self.codec.extension();
        let mut manifest = Manifest::load(self.store.as_ref(), extension).await?;

        let Some(position) = manifest.position(from) else {
            debug!("Checkpoint {} not in manifest, nothing to truncate", from);
            return Ok(TruncateReport::default());
        };

        let removed = manifest.split_off(position);
        manifest.save(self.store.as_ref()).await?;

        let artifacts = {
            let doomed: HashSet<&str> = removed.iter().map(String::as_str).collect();
            self.delete_artifacts(|identity| doomed.contains(identity)).await?
        };

        info!(
            "Truncated {} checkpoint(s) from '{}' ({} artifact(s))",
            removed.len(),
            from,
            artifacts
        );

        let report = TruncateReport { removed, artifacts };
        self.notify(CacheEvent::Truncated {
            from: from.to_string(),
            removed: report.removed.clone(),
            artifacts,
        })
        .await;
        Ok(report)
    }

    /// Remove every artifact and reset the manifest
    ///
    /// Artifacts are found by enumerating the store, so a stale or corrupt
    /// manifest does not leave anything behind.
    pub async fn clear(&self) -> StepCacheResult<ClearReport> {
        let _guard = self.manifest_lock.lock().await;
        let previous = Manifest::load(self.store.as_ref(), self.codec.extension()).await?;

        Manifest::new().save(self.store.as_ref()).await?;
        let artifacts = self.delete_artifacts(|_| true).await?;

        info!("Cleared cache ({} artifact(s))", artifacts);
        self.notify(CacheEvent::Cleared { artifacts }).await;
        Ok(ClearReport {
            removed: previous.checkpoints().to_vec(),
            artifacts,
        })
    }

    /// Checkpoint identities in execution order, as currently persisted
    pub async fn list_checkpoints(&self) -> StepCacheResult<Vec<String>> {
        let manifest = Manifest::load(self.store.as_ref(), self.codec.extension()).await?;
        Ok(manifest.checkpoints().to_vec())
    }

    /// Check whether a checkpoint is recorded in the manifest
    pub async fn contains(&self, identity: &str) -> StepCacheResult<bool> {
        Ok(self.list_checkpoints().await?.iter().any(|c| c == identity))
    }

    /// Artifact store keys grouped by owning identity
    pub async fn artifacts(&self) -> StepCacheResult<BTreeMap<String, Vec<String>>> {
        let extension = self.codec.extension();
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for key in self.store.list_keys().await? {
            if let Some(identity) = parse_artifact_key(&key, extension) {
                grouped.entry(identity.to_string()).or_default().push(key);
            }
        }
        Ok(grouped)
    }

    async fn load_artifact<T: DeserializeOwned>(&self, storage_key: &str) -> StepCacheResult<T> {
        let bytes = self.store.read(storage_key).await?;
        let value = self
            .codec
            .decode(&bytes)
            .map_err(|e| StepCacheError::Decode {
                key: storage_key.to_string(),
                reason: e.to_string(),
            })?;
        from_canonical(storage_key, value)
    }

    fn encode_result<T: Serialize>(&self, identity: &str, result: &T) -> StepCacheResult<Vec<u8>> {
        let value = to_canonical(result)
            .map_err(|reason| StepCacheError::unserializable(identity, format!("result: {reason}")))?;
        self.codec
            .encode(&value)
            .map_err(|e| StepCacheError::unserializable(identity, format!("result: {e}")))
    }

    async fn delete_artifacts<P>(&self, mut selected: P) -> StepCacheResult<usize>
    where
        P: FnMut(&str) -> bool,
    {
        let extension = self.codec.extension();
        let mut deleted = 0;
        for key in self.store.list_keys().await? {
            let Some(identity) = parse_artifact_key(&key, extension) else {
                continue;
            };
            if selected(identity) {
                self.store.delete(&key).await?;
                debug!("Removed cache for checkpoint '{}' ({})", identity, key);
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn notify(&self, event: CacheEvent) {
        for observer in &self.observers {
            observer.notify(&event).await;
        }
    }
}
