//! Desired-versus-cached comparison
//!
//! Staleness is decided from timestamps and source kind only. Remote
//! artifacts have no local mtime, so they are re-fetched unless they were
//! already remote on the previous pass.

use crate::artifact::CacheItem;
use crate::cache::state::CacheState;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Work implied by comparing the desired set with a snapshot
#[derive(Debug, Clone)]
pub struct CacheDiff<T> {
    /// Keys to (re)populate, with the item that populates them
    pub updated: BTreeMap<String, T>,
    /// Cached keys no longer wanted
    pub removable: BTreeSet<String>,
}

impl<T> CacheDiff<T> {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removable.is_empty()
    }
}

/// Classify every desired and cached key
///
/// `previously_remote` holds artifact identities that were remote on the
/// last pass. Cached keys without a desired item are only removable when
/// `prune` is set.
pub fn diff<T: CacheItem>(
    desired: &BTreeMap<String, T>,
    current: &CacheState,
    previously_remote: &BTreeSet<String>,
    prune: bool,
) -> CacheDiff<T> {
    let mut updated = BTreeMap::new();

    for (key, item) in desired {
        if needs_update(key, item, current, previously_remote) {
            updated.insert(key.clone(), item.clone());
        }
    }

    let removable = if prune {
        current
            .keys()
            .filter(|key| !desired.contains_key(*key))
            .map(str::to_string)
            .collect()
    } else {
        BTreeSet::new()
    };

    debug!(
        "Diff: {} to update, {} removable (prune = {})",
        updated.len(),
        removable.len(),
        prune
    );

    CacheDiff { updated, removable }
}

fn needs_update<T: CacheItem>(
    key: &str,
    item: &T,
    current: &CacheState,
    previously_remote: &BTreeSet<String>,
) -> bool {
    let artifact = item.primary();
    let Some(entry) = current.get(key) else {
        debug!("{}: not cached", key);
        return true;
    };
    let was_remote = previously_remote.contains(artifact.identity());

    if artifact.is_remote() {
        if !was_remote {
            debug!("{}: remote artifact not seen before", key);
        }
        return !was_remote;
    }

    if was_remote {
        debug!("{}: source changed from remote to local", key);
        return true;
    }

    match artifact.modified_millis() {
        Some(mtime) if mtime > entry.timestamp => {
            debug!("{}: source newer than cache ({} > {})", key, mtime, entry.timestamp);
            true
        }
        Some(_) => false,
        None => {
            debug!("{}: source mtime unavailable, keeping cached copy", key);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use crate::cache::state::CacheEntry;
    use filetime::FileTime;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn entry(key: &str, timestamp: i64) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            path: PathBuf::from("/cache").join(key),
            timestamp,
        }
    }

    fn local(dir: &TempDir, name: &str, secs: i64) -> Artifact {
        let path = dir.path().join(name);
        std::fs::write(&path, name).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(secs, 0)).unwrap();
        Artifact::local_output(format!("out/{}", name), path)
    }

    #[test]
    fn new_key_is_updated() {
        let temp = TempDir::new().unwrap();
        let desired = BTreeMap::from([("a.jar".to_string(), local(&temp, "a.jar", 100))]);

        let result = diff(&desired, &CacheState::empty(), &BTreeSet::new(), true);
        assert!(result.updated.contains_key("a.jar"));
        assert!(result.removable.is_empty());
    }

    #[test]
    fn newer_local_source_is_updated() {
        let temp = TempDir::new().unwrap();
        let desired = BTreeMap::from([
            ("a.jar".to_string(), local(&temp, "a.jar", 200)),
            ("b.jar".to_string(), local(&temp, "b.jar", 100)),
        ]);
        let current = CacheState::from_entries([entry("a.jar", 100_000), entry("b.jar", 100_000)]);

        let result = diff(&desired, &current, &BTreeSet::new(), true);
        assert_eq!(result.updated.keys().collect::<Vec<_>>(), vec!["a.jar"]);
    }

    #[test]
    fn older_local_source_is_kept() {
        let temp = TempDir::new().unwrap();
        let desired = BTreeMap::from([("a.jar".to_string(), local(&temp, "a.jar", 50))]);
        let current = CacheState::from_entries([entry("a.jar", 100_000)]);

        assert!(diff(&desired, &current, &BTreeSet::new(), true).is_empty());
    }

    #[test]
    fn remote_to_local_is_updated() {
        let temp = TempDir::new().unwrap();
        let artifact = local(&temp, "a.jar", 50);
        let previously_remote = BTreeSet::from([artifact.identity().to_string()]);
        let desired = BTreeMap::from([("a.jar".to_string(), artifact)]);
        let current = CacheState::from_entries([entry("a.jar", 100_000)]);

        let result = diff(&desired, &current, &previously_remote, true);
        assert!(result.updated.contains_key("a.jar"));
    }

    #[test]
    fn remote_is_refetched_unless_previously_remote() {
        let remote = Artifact::remote_output("out/r.jar", "https://cas/r");
        let desired = BTreeMap::from([("r.jar".to_string(), remote)]);
        let current = CacheState::from_entries([entry("r.jar", 1)]);

        let fresh = diff(&desired, &current, &BTreeSet::new(), true);
        assert!(fresh.updated.contains_key("r.jar"));

        let known = BTreeSet::from(["out/r.jar".to_string()]);
        assert!(diff(&desired, &current, &known, true).is_empty());
    }

    #[test]
    fn removal_requires_prune() {
        let desired: BTreeMap<String, Artifact> = BTreeMap::new();
        let current = CacheState::from_entries([entry("obsolete.jar", 1)]);

        let pruned = diff(&desired, &current, &BTreeSet::new(), true);
        assert!(pruned.removable.contains("obsolete.jar"));

        let kept = diff(&desired, &current, &BTreeSet::new(), false);
        assert!(kept.removable.is_empty());
    }

    #[test]
    fn missing_local_source_keeps_cached_copy() {
        let artifact = Artifact::source_file("/no/such/file.jar");
        let desired = BTreeMap::from([("f.jar".to_string(), artifact)]);
        let current = CacheState::from_entries([entry("f.jar", 1)]);

        assert!(diff(&desired, &current, &BTreeSet::new(), false).is_empty());
    }
}
