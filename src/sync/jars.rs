//! Flat-file cache of class jars and their source jars

use crate::artifact::Artifact;
use crate::cache::fs::copy_atomic;
use crate::cache::key::{key_for, EntryKind};
use crate::cache::{CacheState, EntryShape};
use crate::error::ArtcacheResult;
use crate::fetch::LocalInputs;
use crate::sync::{CacheLayout, Synchronizer};
use std::path::{Path, PathBuf};

/// A class jar plus the source jars that describe it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JarLibrary {
    pub jar: Artifact,
    pub source_jars: Vec<Artifact>,
}

impl JarLibrary {
    pub fn new(jar: Artifact) -> Self {
        Self {
            jar,
            source_jars: Vec::new(),
        }
    }

    pub fn with_source_jar(mut self, source_jar: Artifact) -> Self {
        self.source_jars.push(source_jar);
        self
    }
}

/// `<root>/<stem>_<hash>.jar` and `<root>/<stem>_<hash>-src.jar`
#[derive(Debug, Clone, Copy, Default)]
pub struct JarLayout;

impl CacheLayout for JarLayout {
    type Input = JarLibrary;
    type Item = Artifact;

    fn label(&self) -> &'static str {
        "jar"
    }

    fn shape(&self) -> EntryShape {
        // "-src.jar" also ends in ".jar"
        EntryShape::FlatFile {
            suffixes: &[".jar"],
        }
    }

    fn entries(&self, library: &JarLibrary) -> Vec<(String, Artifact)> {
        let mut entries = vec![(key_for(library.jar.identity(), EntryKind::Jar), library.jar.clone())];
        entries.extend(library.source_jars.iter().map(|source_jar| {
            (
                key_for(source_jar.identity(), EntryKind::SourceJar),
                source_jar.clone(),
            )
        }));
        entries
    }

    fn populate(&self, root: &Path, key: &str, artifact: &Artifact, inputs: &LocalInputs) -> ArtcacheResult<()> {
        let source = inputs.resolve(artifact)?;
        copy_atomic(&source, root, key, artifact.modified())?;
        Ok(())
    }
}

/// Synchronizer for the jar cache
pub type JarCache = Synchronizer<JarLayout>;

/// Cached class jar, or the original local jar when it is not cached
pub fn cached_jar(state: &CacheState, jar: &Artifact) -> Option<PathBuf> {
    state
        .locate(jar.identity(), EntryKind::Jar)
        .map(Path::to_path_buf)
        .or_else(|| jar.local_path().map(Path::to_path_buf))
}

/// Cached source jar, or the original local file when it is not cached
pub fn cached_source_jar(state: &CacheState, source_jar: &Artifact) -> Option<PathBuf> {
    state
        .locate(source_jar.identity(), EntryKind::SourceJar)
        .map(Path::to_path_buf)
        .or_else(|| source_jar.local_path().map(Path::to_path_buf))
}
