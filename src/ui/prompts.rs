//! Confirmation prompts with a non-interactive fallback

use super::context::UiContext;
use crate::error::{StepCacheError, StepCacheResult};

/// Ask a yes/no question; returns `default` when there is no terminal
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> StepCacheResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }

    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks on stdin
    let message = message.to_string();
    let result = tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message).initial_value(default).interact()
    })
    .await
    .map_err(|e| StepCacheError::User(format!("Prompt task failed: {}", e)))?;

    result.map_err(|e| StepCacheError::User(format!("Prompt failed: {}", e)))
}

/// Confirm an operation that deletes artifacts
///
/// Without a terminal and without `--yes` this refuses instead of guessing.
pub async fn confirm_destructive(ctx: &UiContext, message: &str) -> StepCacheResult<bool> {
    if !ctx.auto_yes() && !ctx.is_interactive() {
        return Err(StepCacheError::User(
            "Refusing to delete artifacts without confirmation; pass --yes".to_string(),
        ));
    }
    confirm(ctx, message, false).await
}
