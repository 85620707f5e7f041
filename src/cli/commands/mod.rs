//! CLI command implementations

pub mod clear;
pub mod completions;
pub mod config;
pub mod info;
pub mod list;
pub mod truncate;

pub use clear::execute as clear;
pub use completions::execute as completions;
pub use config::execute as config;
pub use info::execute as info;
pub use list::execute as list;
pub use truncate::execute as truncate;

use crate::cache::{AuditLog, CheckpointCache, FsStore};
use crate::config::{Config, ConfigManager};
use crate::error::StepCacheResult;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// A cache opened on the configured root
///
/// The store handle is kept alongside the cache for size lookups.
pub(crate) struct OpenCache {
    pub cache: CheckpointCache,
    pub store: Arc<FsStore>,
}

impl OpenCache {
    /// Open the root from `config`, attaching the audit log when enabled
    pub async fn open(config: &Config) -> StepCacheResult<Self> {
        let store = Arc::new(FsStore::open(&config.cache.root).await?);
        let mut cache = CheckpointCache::with_store(store.clone());

        if config.general.audit_log {
            let path = ConfigManager::audit_log_path();
            debug!("Audit log enabled at {}", path.display());
            cache = cache.with_observer(Arc::new(AuditLog::new(path, true)));
        }

        Ok(Self { cache, store })
    }

    /// Total bytes stored for each identity's artifacts
    pub async fn sizes(
        &self,
        artifacts: &BTreeMap<String, Vec<String>>,
    ) -> StepCacheResult<BTreeMap<String, u64>> {
        let mut sizes = BTreeMap::new();
        for (identity, keys) in artifacts {
            let mut total = 0;
            for key in keys {
                total += self.store.size_of(key).await?;
            }
            sizes.insert(identity.clone(), total);
        }
        Ok(sizes)
    }
}
