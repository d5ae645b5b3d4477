//! Shared state handed to every command

use crate::cache::{CancelToken, Executor, ProgressSink};
use crate::config::Config;
use crate::fetch::{Fetcher, SchemeFetcher};
use crate::sync::{AarCache, AarLayout, JarCache, JarLayout, Synchronizer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Resolved configuration plus the process-wide cancellation token
pub struct CommandContext {
    pub config: Config,
    cache_root: PathBuf,
    cancel: CancelToken,
}

impl CommandContext {
    /// `cache_root` overrides `cache.root` when given
    pub fn new(config: Config, cache_root: Option<PathBuf>, cancel: CancelToken) -> Self {
        let cache_root = cache_root.unwrap_or_else(|| config.cache_root());
        Self {
            config,
            cache_root,
            cancel,
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Jar and archive caches under the cache root
    pub fn caches(&self, progress: Option<Arc<dyn ProgressSink>>) -> CacheSet {
        let fetcher: Arc<dyn Fetcher> = Arc::new(SchemeFetcher::new(Duration::from_secs(
            self.config.fetch.timeout_secs,
        )));
        let mut executor = Executor::new(self.config.cache.workers, self.cancel.clone());
        if let Some(progress) = progress {
            executor = executor.with_progress(progress);
        }

        let jars = Synchronizer::new(
            self.cache_root.join("jars"),
            JarLayout,
            fetcher.clone(),
            executor.clone(),
        )
        .with_enabled(self.config.cache.jars.enabled);
        let aars = Synchronizer::new(
            self.cache_root.join("aars"),
            AarLayout::new(self.config.cache.aars.merge),
            fetcher,
            executor,
        )
        .with_enabled(self.config.cache.aars.enabled);

        CacheSet { jars, aars }
    }
}

/// The two caches kept under one root
pub struct CacheSet {
    pub jars: JarCache,
    pub aars: AarCache,
}
