//! Directory cache of unpacked Android archives
//!
//! Each archive is unpacked into `<stem>_<hash>.aar/` with its compiled
//! jars left out; the build's merged class jar is placed at
//! `jars/classes_and_libs_merged.jar` instead. Archives that share a
//! resource package are also merged into `<package>_<hash>.mergedaar/`.

use crate::artifact::{Artifact, CacheItem};
use crate::cache::key::{group_key, key_for, key_stem, EntryKind};
use crate::cache::merge::{recorded_members, MergeMember};
use crate::cache::unpack::{unpack, ExtraFile, Stamp};
use crate::cache::{CacheState, EntryShape};
use crate::error::ArtcacheResult;
use crate::fetch::LocalInputs;
use crate::sync::{CacheLayout, MergeJob, MergePlan, PassChanges, SyncMode, Synchronizer};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Stamp file inside every unpacked archive
pub const STAMP: &str = "aar.timestamp";

/// Where the separately supplied class jar goes
pub const MERGED_JAR: &str = "jars/classes_and_libs_merged.jar";

/// Resource directory inside an unpacked archive
pub const RESOURCE_DIR: &str = "res";

/// Archive member kept even though it is a jar
const LINT_JAR: &str = "lint.jar";

/// An Android archive, its class jar and resource package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AarLibrary {
    pub aar: Artifact,
    /// Merged class jar produced by the build, replacing the archive's jars
    pub jar: Option<Artifact>,
    /// Resource package; archives sharing one are merged
    pub package: Option<String>,
}

impl AarLibrary {
    pub fn new(aar: Artifact) -> Self {
        Self {
            aar,
            jar: None,
            package: None,
        }
    }

    pub fn with_jar(mut self, jar: Artifact) -> Self {
        self.jar = Some(jar);
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }
}

impl CacheItem for AarLibrary {
    fn primary(&self) -> &Artifact {
        &self.aar
    }

    fn inputs(&self) -> Vec<&Artifact> {
        let mut inputs = vec![&self.aar];
        inputs.extend(self.jar.as_ref());
        inputs
    }
}

/// Jars are supplied separately, except `lint.jar`
pub fn is_excluded_member(member: &Path) -> bool {
    let is_jar = member.extension().is_some_and(|ext| ext == "jar");
    is_jar && member != Path::new(LINT_JAR)
}

/// `<root>/<stem>_<hash>.aar/` plus merged `<package>_<hash>.mergedaar/`
#[derive(Debug, Clone, Copy)]
pub struct AarLayout {
    merge: bool,
}

impl AarLayout {
    pub fn new(merge: bool) -> Self {
        Self { merge }
    }
}

impl Default for AarLayout {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CacheLayout for AarLayout {
    type Input = AarLibrary;
    type Item = AarLibrary;

    fn label(&self) -> &'static str {
        "aar"
    }

    fn shape(&self) -> EntryShape {
        EntryShape::Directory {
            suffixes: &[".aar", ".mergedaar"],
            stamp: STAMP,
        }
    }

    fn is_diffed(&self, key: &str) -> bool {
        key.ends_with(EntryKind::Aar.suffix())
    }

    fn entries(&self, library: &AarLibrary) -> Vec<(String, AarLibrary)> {
        vec![(key_for(library.aar.identity(), EntryKind::Aar), library.clone())]
    }

    fn populate(&self, root: &Path, key: &str, library: &AarLibrary, inputs: &LocalInputs) -> ArtcacheResult<()> {
        let archive = inputs.resolve(&library.aar)?;
        let extras = match library.jar {
            Some(ref jar) => vec![ExtraFile {
                source: inputs.resolve(jar)?,
                relative: PathBuf::from(MERGED_JAR),
            }],
            None => Vec::new(),
        };
        let stamp = Stamp {
            name: STAMP,
            mtime: library.aar.modified(),
        };
        unpack(&archive, &root.join(key), is_excluded_member, stamp, &extras)
    }

    fn plan_merges(
        &self,
        root: &Path,
        inputs: &[AarLibrary],
        snapshot: &CacheState,
        changes: &PassChanges,
    ) -> MergePlan {
        let mut plan = MergePlan::default();
        let cached_merges = snapshot
            .keys()
            .filter(|key| key.ends_with(EntryKind::MergedAar.suffix()));

        if !self.merge {
            plan.stale = cached_merges.map(str::to_string).collect();
            return plan;
        }

        // package -> sorted member keys
        let mut groups: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for library in inputs {
            if let Some(ref package) = library.package {
                groups
                    .entry(package.as_str())
                    .or_default()
                    .insert(key_for(library.aar.identity(), EntryKind::Aar));
            }
        }

        let wanted: BTreeSet<String> = groups.keys().map(|package| group_key(package)).collect();
        if changes.mode.prunes() && !changes.existing_only {
            plan.stale = cached_merges
                .filter(|key| !wanted.contains(*key))
                .map(str::to_string)
                .collect();
        }

        for (package, mut member_keys) in groups {
            let key = group_key(package);
            let dest = root.join(&key);
            let exists = dest.is_dir();
            let affected = changes.mode == SyncMode::Full
                || changes.removed > 0
                || member_keys.iter().any(|member| changes.copied.contains(member))
                || (!exists && !changes.existing_only);
            if !affected || (changes.existing_only && !exists) {
                continue;
            }

            // A non-pruning pass may list only some members of the group
            if exists && !changes.mode.prunes() {
                member_keys.extend(
                    recorded_members(&dest)
                        .into_iter()
                        .filter(|member| member.ends_with(EntryKind::Aar.suffix())),
                );
            }

            let members: Vec<MergeMember> = member_keys
                .iter()
                .map(|member| MergeMember {
                    key_stem: key_stem(member).to_string(),
                    dir: root.join(member),
                })
                .filter(|member| member.dir.is_dir())
                .collect();
            debug!("Merging {} member(s) into {}", members.len(), key);
            plan.jobs.push(MergeJob {
                group: package.to_string(),
                key,
                members,
            });
        }
        plan
    }
}

/// Synchronizer for the unpacked archive cache
pub type AarCache = Synchronizer<AarLayout>;

/// Unpacked directory of an archive
pub fn aar_dir(state: &CacheState, aar: &Artifact) -> Option<PathBuf> {
    state.locate(aar.identity(), EntryKind::Aar).map(Path::to_path_buf)
}

/// Resource directory of an unpacked archive
pub fn resource_dir(state: &CacheState, aar: &Artifact) -> Option<PathBuf> {
    aar_dir(state, aar).map(|dir| dir.join(RESOURCE_DIR))
}

/// Cached class jar of a library, or its original local jar when not cached
pub fn class_jar(state: &CacheState, library: &AarLibrary) -> Option<PathBuf> {
    aar_dir(state, &library.aar)
        .map(|dir| dir.join(MERGED_JAR))
        .filter(|jar| jar.is_file())
        .or_else(|| {
            library
                .jar
                .as_ref()
                .and_then(|jar| jar.local_path().map(Path::to_path_buf))
        })
}

/// Merged resource directory of a package
pub fn merged_dir(state: &CacheState, package: &str) -> Option<PathBuf> {
    state.get(&group_key(package)).map(|entry| entry.path.clone())
}
