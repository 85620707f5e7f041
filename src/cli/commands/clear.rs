//! Clear command - remove every artifact in the cache root

use super::OpenCache;
use crate::cli::args::ClearArgs;
use crate::config::Config;
use crate::error::StepCacheResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config) -> StepCacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let root = &config.cache.root;

    if !root.is_dir() {
        ui::step_info(&ctx, &format!("No cache found at {}", root.display()));
        return Ok(());
    }

    let opened = OpenCache::open(config).await?;
    let checkpoints = opened.cache.list_checkpoints().await?;
    let artifact_count: usize = opened.cache.artifacts().await?.values().map(Vec::len).sum();

    if checkpoints.is_empty() && artifact_count == 0 {
        ui::step_info(&ctx, "Cache is already empty");
        return Ok(());
    }

    ui::intro(&ctx, "stepcache clear");
    ui::key_value(&ctx, "Root", &root.display().to_string());
    ui::key_value(&ctx, "Checkpoints", &checkpoints.len().to_string());
    ui::key_value(&ctx, "Artifacts", &artifact_count.to_string());

    if !ui::confirm_destructive(&ctx, "Remove every cached artifact?").await? {
        ui::outro_warn(&ctx, "Aborted");
        return Ok(());
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Clearing cache...");

    let report = match opened.cache.clear().await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Clear failed");
            return Err(e);
        }
    };

    spinner.stop(&format!(
        "Removed {} checkpoint(s), {} artifact(s)",
        report.removed.len(),
        report.artifacts
    ));
    ui::outro_success(&ctx, "Cache cleared");

    Ok(())
}
