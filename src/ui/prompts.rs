//! Interactive prompts with non-interactive fallback

use super::context::UiContext;
use crate::error::{ArtcacheError, ArtcacheResult};

/// Ask a yes/no question
///
/// `--yes` approves without asking; a non-interactive run answers `default`.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> ArtcacheResult<bool> {
    if ctx.auto_yes() {
        println!("  {} (auto-approved)", message);
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks on stdin
    let message = message.to_string();
    tokio::task::spawn_blocking(move || cliclack::confirm(&message).initial_value(default).interact())
        .await
        .map_err(|e| ArtcacheError::Internal(format!("prompt task failed: {}", e)))?
        .map_err(|e| ArtcacheError::User(format!("Prompt failed: {}", e)))
}
