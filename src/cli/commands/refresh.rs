//! Refresh command - update stale entries without adding or removing any

use super::sync::{invalid, print_reports};
use crate::cli::args::{includes, CacheSelection, OutputFormat, RefreshArgs};
use crate::cli::context::CommandContext;
use crate::error::ArtcacheResult;
use crate::manifest::ArtifactManifest;
use crate::ui::{self, UiContext};

/// Execute the refresh command
pub async fn execute(args: RefreshArgs, ctx: &CommandContext) -> ArtcacheResult<()> {
    let ui_ctx = UiContext::detect();
    let manifest = ArtifactManifest::load(&args.manifest).await?;
    let caches = ctx.caches(None);
    let mut reports = Vec::new();

    if includes(args.only, CacheSelection::Jars) {
        let libraries = manifest.jar_libraries().map_err(|reason| invalid(&args.manifest, reason))?;
        reports.push(caches.jars.refresh(libraries, &manifest.previous_remote).await?.report);
    }
    if includes(args.only, CacheSelection::Aars) {
        let libraries = manifest.aar_libraries().map_err(|reason| invalid(&args.manifest, reason))?;
        reports.push(caches.aars.refresh(libraries, &manifest.previous_remote).await?.report);
    }

    if reports.iter().all(|report| report.copied == 0 && report.merged == 0 && report.failed == 0) {
        ui::step_info(&ui_ctx, "Cached entries are up to date");
        return Ok(());
    }
    print_reports(&ui_ctx, &reports, OutputFormat::Table)
}
