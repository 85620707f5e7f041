//! Checkpoint manifest
//!
//! Ordered, duplicate-free list of checkpoint identities in first-execution
//! order, persisted in the cache root next to the artifacts. The manifest is
//! the source of truth for order; enumerating artifacts is only used to
//! recover when the manifest is missing or unreadable.

use crate::cache::key::{parse_artifact_key, MANIFEST_KEY};
use crate::cache::store::ByteStore;
use crate::error::StepCacheResult;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Current on-disk schema version
const MANIFEST_VERSION: u32 = 1;

/// Ordered record of executed checkpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,

    /// Checkpoint identities in first-execution order
    #[serde(default)]
    pub checkpoints: Vec<String>,
}

fn default_version() -> u32 {
    MANIFEST_VERSION
}

/// Accepted on-disk shapes
#[derive(Deserialize)]
#[serde(untagged)]
enum ManifestFile {
    Document(Manifest),
    List(Vec<String>),
}

impl Manifest {
    /// Create an empty manifest
    pub fn new() -> Self {
        Self {
            version: MANIFEST_VERSION,
            checkpoints: vec![],
        }
    }

    /// Parse manifest bytes, dropping duplicate entries
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let checkpoints = match serde_json::from_slice::<ManifestFile>(bytes)? {
            ManifestFile::Document(doc) => doc.checkpoints,
            ManifestFile::List(list) => list,
        };

        let mut manifest = Self::new();
        for identity in checkpoints {
            manifest.append(&identity);
        }
        Ok(manifest)
    }

    /// Load the manifest from a store
    ///
    /// A missing or unreadable manifest is rebuilt from the artifact keys
    /// present in the store instead of failing.
    pub async fn load(store: &dyn ByteStore, extension: &str) -> StepCacheResult<Self> {
        if !store.exists(MANIFEST_KEY).await? {
            let rebuilt = Self::rebuild(store, extension).await?;
            if !rebuilt.is_empty() {
                warn!(
                    "Manifest missing in {}, recovered {} checkpoint(s) from artifacts",
                    store.describe(),
                    rebuilt.len()
                );
            }
            return Ok(rebuilt);
        }

        let bytes = store.read(MANIFEST_KEY).await?;
        match Self::parse(&bytes) {
            Ok(manifest) => {
                debug!("Loaded manifest with {} checkpoint(s)", manifest.len());
                Ok(manifest)
            }
            Err(e) => {
                warn!(
                    "Manifest in {} is unreadable ({}), rebuilding from artifacts",
                    store.describe(),
                    e
                );
                Self::rebuild(store, extension).await
            }
        }
    }

    /// Infer a best-effort manifest from artifact keys
    ///
    /// Identities appear in store listing order, since execution order
    /// cannot be recovered from the artifacts alone.
    pub async fn rebuild(store: &dyn ByteStore, extension: &str) -> StepCacheResult<Self> {
        let mut manifest = Self::new();
        for key in store.list_keys().await? {
            if let Some(identity) = parse_artifact_key(&key, extension) {
                manifest.append(identity);
            }
        }
        Ok(manifest)
    }

    /// Persist the manifest to a store
    pub async fn save(&self, store: &dyn ByteStore) -> StepCacheResult<()> {
        let bytes = serde_json::to_vec_pretty(self)?;
        store.write(MANIFEST_KEY, &bytes).await?;
        debug!("Saved manifest with {} checkpoint(s)", self.len());
        Ok(())
    }

    /// Position of an identity
    pub fn position(&self, identity: &str) -> Option<usize> {
        self.checkpoints.iter().position(|c| c == identity)
    }

    /// Check whether an identity is recorded
    pub fn contains(&self, identity: &str) -> bool {
        self.position(identity).is_some()
    }

    /// Append an identity unless already present; returns whether it was added
    pub fn append(&mut self, identity: &str) -> bool {
        if self.contains(identity) {
            return false;
        }
        self.checkpoints.push(identity.to_string());
        true
    }

    /// Remove the identity at `position` and everything after it
    pub fn split_off(&mut self, position: usize) -> Vec<String> {
        self.checkpoints.split_off(position.min(self.checkpoints.len()))
    }

    /// Identities in order
    pub fn checkpoints(&self) -> &[String] {
        &self.checkpoints
    }

    /// Number of identities
    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Check if the manifest is empty
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}
