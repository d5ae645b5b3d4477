//! Cache synchronization passes
//!
//! A pass mirrors a desired artifact set into one cache root:
//!
//! 1. ensure the root exists (fatal on failure)
//! 2. scan, or clear everything in `full` mode
//! 3. diff the desired entries against the snapshot
//! 4. fetch remote inputs into a scratch directory
//! 5. populate updated entries and delete removable ones concurrently
//! 6. merge affected groups
//! 7. re-scan and report
//!
//! What an entry looks like on disk is up to the [`CacheLayout`].

pub mod aars;
pub mod jars;

use crate::artifact::{Artifact, CacheItem};
use crate::cache::executor::{blocking, Executor, Phase};
use crate::cache::fs::{clear_root, delete_entry, ensure_root, entry_size, ClearOutcome};
use crate::cache::merge::{merge_group, MergeMember};
use crate::cache::{diff, CacheDiff, CacheState, EntryKind, EntryShape};
use crate::error::ArtcacheResult;
use crate::fetch::{create_scratch_dir, materialize, Fetcher, LocalInputs};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub use aars::{AarCache, AarLayout, AarLibrary};
pub use jars::{JarCache, JarLayout, JarLibrary};

type Unit<T> = Pin<Box<dyn Future<Output = ArtcacheResult<T>> + Send>>;

fn unit<T, F>(future: F) -> Unit<T>
where
    F: Future<Output = ArtcacheResult<T>> + Send + 'static,
{
    Box::pin(future)
}

/// How a pass treats entries that are no longer declared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Clear the cache, then populate every desired entry
    Full,
    /// Diff and prune undeclared entries
    #[default]
    Incremental,
    /// Diff but never prune; the artifact list is known to be incomplete
    Partial,
}

impl SyncMode {
    /// Whether undeclared entries are removed
    pub fn prunes(&self) -> bool {
        matches!(self, Self::Incremental)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Incremental => write!(f, "incremental"),
            Self::Partial => write!(f, "partial"),
        }
    }
}

/// Inputs of one sync pass
#[derive(Debug, Clone)]
pub struct SyncRequest<I> {
    pub inputs: Vec<I>,
    pub mode: SyncMode,
    /// Identities that were remote on the previous pass
    pub previously_remote: BTreeSet<String>,
}

impl<I> SyncRequest<I> {
    pub fn new(inputs: Vec<I>, mode: SyncMode) -> Self {
        Self {
            inputs,
            mode,
            previously_remote: BTreeSet::new(),
        }
    }

    pub fn with_previously_remote(mut self, identities: BTreeSet<String>) -> Self {
        self.previously_remote = identities;
        self
    }
}

/// Summary of one pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    /// Cache label ("jar", "aar")
    pub cache: String,
    pub copied: usize,
    pub removed: usize,
    pub merged: usize,
    pub failed: usize,
    /// Entries present after the pass
    pub entries: usize,
    pub total_bytes: u64,
    /// Remote identities of this pass, to pass back as `previously_remote`
    pub remote_identities: BTreeSet<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncReport {
    fn new(cache: &str) -> Self {
        Self {
            cache: cache.to_string(),
            ..Self::default()
        }
    }

    /// Size line reported after every pass
    pub fn size_line(&self) -> String {
        format!(
            "Total {} size: {} kB ({} entries)",
            self.cache,
            self.total_bytes / 1024,
            self.entries
        )
    }

    fn add_cleared(&mut self, cleared: ClearOutcome) {
        self.removed += cleared.removed;
        self.failed += cleared.failed;
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "copied {}, removed {}, merged {}",
            self.copied, self.removed, self.merged
        )?;
        if self.failed > 0 {
            write!(f, ", failed {}", self.failed)?;
        }
        Ok(())
    }
}

/// Report plus the snapshot taken after the pass
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub report: SyncReport,
    pub state: CacheState,
}

/// What happened to primary entries during a pass
#[derive(Debug, Clone)]
pub struct PassChanges {
    pub copied: BTreeSet<String>,
    pub removed: usize,
    pub mode: SyncMode,
    /// Refresh passes never create entries
    pub existing_only: bool,
}

/// A merged directory to (re)build
#[derive(Debug, Clone)]
pub struct MergeJob {
    pub group: String,
    pub key: String,
    pub members: Vec<MergeMember>,
}

/// Merge work decided by a layout after the populate phase
#[derive(Debug, Clone, Default)]
pub struct MergePlan {
    pub jobs: Vec<MergeJob>,
    /// Merged keys to delete
    pub stale: Vec<String>,
}

/// How one kind of artifact is laid out under a cache root
pub trait CacheLayout: Send + Sync + 'static {
    /// What callers supply per library
    type Input: Clone + Send + Sync + 'static;
    /// One cache entry's worth of artifacts
    type Item: CacheItem;

    /// Short label used in reports
    fn label(&self) -> &'static str;

    /// Naming convention of everything under the root
    fn shape(&self) -> EntryShape;

    /// Whether a scanned key takes part in the diff
    fn is_diffed(&self, _key: &str) -> bool {
        true
    }

    /// Keyed entries for one input
    fn entries(&self, input: &Self::Input) -> Vec<(String, Self::Item)>;

    /// Write the entry for `item` at `root/key`; runs on the blocking pool
    fn populate(&self, root: &Path, key: &str, item: &Self::Item, inputs: &LocalInputs) -> ArtcacheResult<()>;

    /// Merged outputs to rebuild or delete after populating
    fn plan_merges(
        &self,
        _root: &Path,
        _inputs: &[Self::Input],
        _snapshot: &CacheState,
        _changes: &PassChanges,
    ) -> MergePlan {
        MergePlan::default()
    }
}

/// Mirrors desired artifacts into one cache root
pub struct Synchronizer<L: CacheLayout> {
    root: PathBuf,
    layout: Arc<L>,
    fetcher: Arc<dyn Fetcher>,
    executor: Executor,
    enabled: bool,
}

impl<L: CacheLayout> Synchronizer<L> {
    pub fn new(root: impl Into<PathBuf>, layout: L, fetcher: Arc<dyn Fetcher>, executor: Executor) -> Self {
        Self {
            root: root.into(),
            layout: Arc::new(layout),
            fetcher,
            executor,
            enabled: true,
        }
    }

    /// A disabled cache is emptied on every pass
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Fresh snapshot of the cache root
    pub async fn scan(&self) -> ArtcacheResult<CacheState> {
        let root = self.root.clone();
        let shape = self.layout.shape();
        blocking(move || crate::cache::scan(&root, &shape)).await
    }

    /// Re-scan and look up one identity
    pub async fn locate(&self, identity: &str, kind: EntryKind) -> ArtcacheResult<Option<PathBuf>> {
        Ok(self
            .scan()
            .await?
            .locate(identity, kind)
            .map(Path::to_path_buf))
    }

    /// Run one sync pass
    pub async fn sync(&self, request: SyncRequest<L::Input>) -> ArtcacheResult<SyncOutcome> {
        info!(
            "Syncing {} cache at {} ({} mode)",
            self.layout.label(),
            self.root.display(),
            request.mode
        );
        self.run_pass(request.inputs, request.mode, &request.previously_remote, false)
            .await
    }

    /// Update stale entries that are already cached; never adds or removes
    pub async fn refresh(
        &self,
        inputs: Vec<L::Input>,
        previously_remote: &BTreeSet<String>,
    ) -> ArtcacheResult<SyncOutcome> {
        info!("Refreshing {} cache at {}", self.layout.label(), self.root.display());
        self.run_pass(inputs, SyncMode::Partial, previously_remote, true)
            .await
    }

    /// Delete every entry
    pub async fn clear(&self) -> ArtcacheResult<SyncOutcome> {
        let started = Instant::now();
        let mut report = SyncReport::new(self.layout.label());
        report.add_cleared(self.clear_entries().await?);
        self.finish(report, started).await
    }

    async fn run_pass(
        &self,
        inputs: Vec<L::Input>,
        mode: SyncMode,
        previously_remote: &BTreeSet<String>,
        existing_only: bool,
    ) -> ArtcacheResult<SyncOutcome> {
        let started = Instant::now();
        let mut report = SyncReport::new(self.layout.label());

        let root = self.root.clone();
        blocking(move || ensure_root(&root)).await?;

        if !self.enabled {
            info!("{} cache is disabled, clearing it", self.layout.label());
            report.add_cleared(self.clear_entries().await?);
            return self.finish(report, started).await;
        }
        self.executor.check_cancelled()?;

        let current = if mode == SyncMode::Full {
            report.add_cleared(self.clear_entries().await?);
            CacheState::empty()
        } else {
            self.scan().await?
        };

        let mut desired = BTreeMap::new();
        for input in &inputs {
            desired.extend(self.layout.entries(input));
        }
        report.remote_identities = desired
            .values()
            .flat_map(|item: &L::Item| item.inputs())
            .filter(|artifact| artifact.is_remote())
            .map(|artifact| artifact.identity().to_string())
            .collect();
        if existing_only {
            desired.retain(|key, _| current.contains(key));
        }

        let diffed = current.filter(|key| self.layout.is_diffed(key));
        let prune = mode.prunes() && !existing_only;
        let plan = diff(&desired, &diffed, previously_remote, prune);

        let copied = self.apply(&plan, &current, &mut report).await?;
        self.executor.check_cancelled()?;

        let changes = PassChanges {
            copied,
            removed: report.removed,
            mode,
            existing_only,
        };
        let merges = self.layout.plan_merges(&self.root, &inputs, &current, &changes);
        self.apply_merges(merges, &current, &mut report).await?;

        self.finish(report, started).await
    }

    /// Fetch, populate and remove; returns the keys that were populated
    async fn apply(
        &self,
        plan: &CacheDiff<L::Item>,
        current: &CacheState,
        report: &mut SyncReport,
    ) -> ArtcacheResult<BTreeSet<String>> {
        let remote: Vec<Artifact> = plan
            .updated
            .values()
            .flat_map(|item| item.inputs())
            .filter(|artifact| artifact.is_remote())
            .cloned()
            .collect();

        let scratch = if remote.is_empty() {
            None
        } else {
            Some(create_scratch_dir().await?)
        };
        let result = self.populate(plan, current, remote, scratch.as_deref()).await;
        if let Some(dir) = scratch {
            // Best-effort cleanup
            let _ = tokio::fs::remove_dir_all(&dir).await;
        }
        let (fetch_failures, outcome) = result?;

        report.failed += fetch_failures + outcome.failed.len();
        let mut copied = BTreeSet::new();
        for (key, change) in outcome.succeeded {
            match change {
                Change::Copied => {
                    report.copied += 1;
                    copied.insert(key);
                }
                Change::Removed => report.removed += 1,
            }
        }
        Ok(copied)
    }

    async fn populate(
        &self,
        plan: &CacheDiff<L::Item>,
        current: &CacheState,
        remote: Vec<Artifact>,
        scratch: Option<&Path>,
    ) -> ArtcacheResult<(usize, crate::cache::PhaseOutcome<Change>)> {
        let (inputs, fetch_failures) = match scratch {
            Some(dir) => materialize(self.fetcher.clone(), &self.executor, remote, dir).await?,
            None => (LocalInputs::default(), Vec::new()),
        };
        let inputs = Arc::new(inputs);

        let mut units: Vec<(String, Unit<Change>)> = Vec::new();
        for (key, item) in &plan.updated {
            let layout = self.layout.clone();
            let root = self.root.clone();
            let inputs = inputs.clone();
            let item = item.clone();
            let entry_key = key.clone();
            units.push((
                key.clone(),
                unit(async move {
                    blocking(move || layout.populate(&root, &entry_key, &item, &inputs)).await?;
                    Ok(Change::Copied)
                }),
            ));
        }
        for key in &plan.removable {
            let Some(entry) = current.get(key) else {
                continue;
            };
            let path = entry.path.clone();
            units.push((
                key.clone(),
                unit(async move {
                    blocking(move || delete_entry(&path)).await?;
                    Ok(Change::Removed)
                }),
            ));
        }

        let outcome = self.executor.run(Phase::Populate, units).await?;
        Ok((fetch_failures.len(), outcome))
    }

    async fn apply_merges(
        &self,
        plan: MergePlan,
        current: &CacheState,
        report: &mut SyncReport,
    ) -> ArtcacheResult<()> {
        let stale: Vec<(String, Unit<()>)> = plan
            .stale
            .into_iter()
            .filter_map(|key| {
                let path = current.get(&key)?.path.clone();
                Some((key, unit(async move { blocking(move || delete_entry(&path)).await })))
            })
            .collect();
        let removed = self.executor.run(Phase::Remove, stale).await?;
        report.removed += removed.succeeded.len();
        report.failed += removed.failed.len();

        let jobs: Vec<(String, Unit<bool>)> = plan
            .jobs
            .into_iter()
            .map(|job| {
                let dest = self.root.join(&job.key);
                let key = job.key.clone();
                let merge = unit(async move {
                    blocking(move || {
                        let outcome = merge_group(&job.group, &dest, &job.members)?;
                        Ok(outcome.path.is_some())
                    })
                    .await
                });
                (key, merge)
            })
            .collect();
        let merged = self.executor.run(Phase::Merge, jobs).await?;
        report.merged += merged.succeeded.iter().filter(|(_, produced)| *produced).count();
        report.failed += merged.failed.len();
        Ok(())
    }

    async fn clear_entries(&self) -> ArtcacheResult<ClearOutcome> {
        let root = self.root.clone();
        blocking(move || Ok(clear_root(&root))).await
    }

    async fn finish(&self, mut report: SyncReport, started: Instant) -> ArtcacheResult<SyncOutcome> {
        let state = self.scan().await?;
        let paths: Vec<PathBuf> = state.entries().map(|entry| entry.path.clone()).collect();
        report.total_bytes = blocking(move || Ok(paths.iter().map(|path| entry_size(path)).sum::<u64>())).await?;
        report.entries = state.len();
        report.elapsed = started.elapsed();

        info!("{} cache: {} in {:?}", report.cache, report, report.elapsed);
        debug!("{}", report.size_line());
        Ok(SyncOutcome { report, state })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Copied,
    Removed,
}
