//! Locate command - print the cached path of one artifact

use crate::cache::EntryKind;
use crate::cli::args::{LocateArgs, LocateKind};
use crate::cli::context::CommandContext;
use crate::error::{ArtcacheError, ArtcacheResult};
use crate::sync::aars::{merged_dir, MERGED_JAR, RESOURCE_DIR};
use std::path::PathBuf;
use tracing::debug;

/// Execute the locate command
pub async fn execute(args: LocateArgs, ctx: &CommandContext) -> ArtcacheResult<()> {
    let caches = ctx.caches(None);
    let identity = args.identity.as_str();

    let found: Option<PathBuf> = match args.kind {
        LocateKind::Jar => caches.jars.locate(identity, EntryKind::Jar).await?,
        LocateKind::SourceJar => caches.jars.locate(identity, EntryKind::SourceJar).await?,
        LocateKind::Aar => caches.aars.locate(identity, EntryKind::Aar).await?,
        LocateKind::Res => caches
            .aars
            .locate(identity, EntryKind::Aar)
            .await?
            .map(|dir| dir.join(RESOURCE_DIR))
            .filter(|dir| dir.is_dir()),
        LocateKind::ClassJar => caches
            .aars
            .locate(identity, EntryKind::Aar)
            .await?
            .map(|dir| dir.join(MERGED_JAR))
            .filter(|jar| jar.is_file()),
        LocateKind::Merged => merged_dir(&caches.aars.scan().await?, identity),
    };

    match found {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => {
            debug!("{} not found under {}", identity, ctx.cache_root().display());
            Err(ArtcacheError::NotCached(identity.to_string()))
        }
    }
}
