//! Sync command - mirror a manifest into the caches

use crate::cli::args::{includes, CacheSelection, OutputFormat, SyncArgs};
use crate::cli::context::CommandContext;
use crate::cache::ProgressSink;
use crate::error::{ArtcacheError, ArtcacheResult};
use crate::manifest::ArtifactManifest;
use crate::sync::{SyncReport, SyncRequest};
use crate::ui::{self, SyncProgress, UiContext};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Execute the sync command
pub async fn execute(args: SyncArgs, ctx: &CommandContext) -> ArtcacheResult<()> {
    let ui_ctx = UiContext::detect();
    let manifest = ArtifactManifest::load(&args.manifest).await?;
    let progress: Option<Arc<dyn ProgressSink>> = match args.format {
        OutputFormat::Json => None,
        _ => Some(Arc::new(SyncProgress::new(&ui_ctx, "artifact"))),
    };
    let caches = ctx.caches(progress);
    let mut reports = Vec::new();

    if includes(args.only, CacheSelection::Jars) {
        let libraries = manifest.jar_libraries().map_err(|reason| invalid(&args.manifest, reason))?;
        let request = SyncRequest::new(libraries, args.mode)
            .with_previously_remote(manifest.previous_remote.clone());
        reports.push(caches.jars.sync(request).await?.report);
    }
    if includes(args.only, CacheSelection::Aars) {
        let libraries = manifest.aar_libraries().map_err(|reason| invalid(&args.manifest, reason))?;
        let request = SyncRequest::new(libraries, args.mode)
            .with_previously_remote(manifest.previous_remote.clone());
        reports.push(caches.aars.sync(request).await?.report);
    }

    print_reports(&ui_ctx, &reports, args.format)
}

pub(crate) fn invalid(path: &Path, reason: String) -> ArtcacheError {
    ArtcacheError::ManifestInvalid {
        path: path.to_path_buf(),
        reason,
    }
}

/// Print one summary per cache
pub(crate) fn print_reports(ctx: &UiContext, reports: &[SyncReport], format: OutputFormat) -> ArtcacheResult<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(reports)?);
        }
        OutputFormat::Plain => {
            for report in reports {
                println!("{}: {}", report.cache, report);
            }
        }
        OutputFormat::Table => {
            for report in reports {
                let line = format!("{} cache: {}", report.cache, report);
                if report.failed > 0 {
                    ui::step_warn_hint(ctx, &line, "run with -v to see the failing entries");
                } else {
                    ui::step_ok(ctx, &line);
                }
                ui::remark(ctx, &report.size_line());
            }
            let remote: BTreeSet<&str> = reports
                .iter()
                .flat_map(|report| report.remote_identities.iter().map(String::as_str))
                .collect();
            if !remote.is_empty() {
                ui::remark(
                    ctx,
                    &format!("{} remote output(s); list them in previous_remote for the next sync", remote.len()),
                );
            }
        }
    }
    Ok(())
}
