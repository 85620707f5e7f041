//! Truncate command - drop a checkpoint and everything after it

use super::OpenCache;
use crate::cli::args::TruncateArgs;
use crate::config::Config;
use crate::error::StepCacheResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the truncate command
pub async fn execute(args: TruncateArgs, config: &Config) -> StepCacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let root = &config.cache.root;

    if !root.is_dir() {
        ui::step_info(&ctx, &format!("No cache found at {}", root.display()));
        return Ok(());
    }

    let opened = OpenCache::open(config).await?;
    let checkpoints = opened.cache.list_checkpoints().await?;

    let Some(position) = checkpoints.iter().position(|c| *c == args.checkpoint) else {
        ui::step_warn_hint(
            &ctx,
            &format!("Checkpoint '{}' is not recorded, nothing to do", args.checkpoint),
            "Run `stepcache list` to see recorded checkpoints",
        );
        return Ok(());
    };

    let doomed = &checkpoints[position..];
    ui::intro(&ctx, "stepcache truncate");
    for name in doomed {
        ui::remark(&ctx, name);
    }

    let prompt = format!("Remove {} checkpoint(s) and their artifacts?", doomed.len());
    if !ui::confirm_destructive(&ctx, &prompt).await? {
        ui::outro_warn(&ctx, "Aborted");
        return Ok(());
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Truncating from '{}'...", args.checkpoint));

    let report = match opened.cache.truncate(&args.checkpoint).await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Truncation failed");
            return Err(e);
        }
    };

    spinner.stop(&format!(
        "Removed {} checkpoint(s), {} artifact(s)",
        report.removed.len(),
        report.artifacts
    ));

    let remaining = opened.cache.list_checkpoints().await?;
    ui::outro_success(&ctx, &format!("{} checkpoint(s) remain", remaining.len()));

    Ok(())
}
