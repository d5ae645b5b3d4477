//! Clear command - empty the caches

use crate::cli::args::{includes, CacheSelection, ClearArgs};
use crate::cli::context::CommandContext;
use crate::error::ArtcacheResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the clear command
pub async fn execute(args: ClearArgs, ctx: &CommandContext) -> ArtcacheResult<()> {
    let ui_ctx = UiContext::detect().with_auto_yes(args.yes);
    let root = ctx.cache_root().display().to_string();

    let prompt = format!("Delete every cached entry under {}?", root);
    if !ui::confirm(&ui_ctx, &prompt, false).await? {
        ui::step_warn_hint(&ui_ctx, "Nothing cleared", "Pass --yes to clear without a prompt");
        return Ok(());
    }

    let caches = ctx.caches(None);
    let mut spinner = TaskSpinner::new(&ui_ctx);
    spinner.start("Clearing caches...");

    let mut removed = 0;
    let mut failed = 0;
    if includes(args.only, CacheSelection::Jars) {
        let report = caches.jars.clear().await?.report;
        removed += report.removed;
        failed += report.failed;
    }
    if includes(args.only, CacheSelection::Aars) {
        let report = caches.aars.clear().await?.report;
        removed += report.removed;
        failed += report.failed;
    }

    if failed > 0 {
        spinner.stop_error(&format!("Removed {} entries, {} could not be deleted", removed, failed));
    } else {
        spinner.stop(&format!("Removed {} entries", removed));
    }
    Ok(())
}
