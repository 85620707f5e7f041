//! Info command - summarize a cache root

use super::OpenCache;
use crate::cache::{ByteStore, Manifest, MANIFEST_KEY};
use crate::config::{Config, ConfigManager};
use crate::error::StepCacheResult;
use crate::ui::{self, format_bytes, UiContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestState {
    Valid,
    Missing,
    Corrupt,
}

impl ManifestState {
    fn label(self) -> &'static str {
        match self {
            Self::Valid => "ok",
            Self::Missing => "missing (recovered from artifacts)",
            Self::Corrupt => "unreadable (recovered from artifacts)",
        }
    }
}

/// Execute the info command
pub async fn execute(config: &Config) -> StepCacheResult<()> {
    let ctx = UiContext::detect();
    let root = &config.cache.root;

    ui::intro(&ctx, "stepcache");
    ui::key_value(&ctx, "Root", &root.display().to_string());
    if config.general.audit_log {
        ui::key_value(
            &ctx,
            "Audit log",
            &ConfigManager::audit_log_path().display().to_string(),
        );
    }

    if !root.is_dir() {
        ui::key_value_status(&ctx, "Status", "not created yet", false);
        return Ok(());
    }

    let opened = OpenCache::open(config).await?;
    let state = manifest_state(opened.store.as_ref()).await?;
    let checkpoints = opened.cache.list_checkpoints().await?;
    let artifacts = opened.cache.artifacts().await?;
    let sizes = opened.sizes(&artifacts).await?;

    let artifact_count: usize = artifacts.values().map(Vec::len).sum();
    let total_bytes: u64 = sizes.values().sum();

    ui::key_value_status(&ctx, "Manifest", state.label(), state == ManifestState::Valid);
    ui::key_value(&ctx, "Checkpoints", &checkpoints.len().to_string());
    ui::key_value(&ctx, "Artifacts", &artifact_count.to_string());
    ui::key_value(&ctx, "Size", &format_bytes(total_bytes));

    for identity in artifacts.keys().filter(|id| !checkpoints.contains(*id)) {
        ui::step_warn_hint(
            &ctx,
            &format!("Artifacts for '{}' are not in the manifest", identity),
            "Run `stepcache clear` to remove them",
        );
    }

    Ok(())
}

async fn manifest_state(store: &dyn ByteStore) -> StepCacheResult<ManifestState> {
    if !store.exists(MANIFEST_KEY).await? {
        return Ok(ManifestState::Missing);
    }

    let bytes = store.read(MANIFEST_KEY).await?;
    Ok(match Manifest::parse(&bytes) {
        Ok(_) => ManifestState::Valid,
        Err(_) => ManifestState::Corrupt,
    })
}
