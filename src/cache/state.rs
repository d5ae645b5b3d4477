//! Cache state snapshots
//!
//! The on-disk tree is the only record of what is cached. A [`CacheState`]
//! is rebuilt by listing the cache root and is never updated in place;
//! every mutating pass ends with a fresh scan.

use crate::artifact::millis;
use crate::cache::key::{key_for, EntryKind};
use crate::error::{ArtcacheError, ArtcacheResult};
use filetime::FileTime;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Naming convention for entries under one cache root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryShape {
    /// Regular files ending with one of the suffixes, timestamped by mtime
    FlatFile { suffixes: &'static [&'static str] },
    /// Directories ending with one of the suffixes, timestamped by a stamp file
    Directory {
        suffixes: &'static [&'static str],
        stamp: &'static str,
    },
}

impl EntryShape {
    fn suffixes(&self) -> &'static [&'static str] {
        match self {
            Self::FlatFile { suffixes } | Self::Directory { suffixes, .. } => suffixes,
        }
    }

    fn matches_name(&self, name: &str) -> bool {
        !name.starts_with('.') && self.suffixes().iter().any(|suffix| name.ends_with(suffix))
    }
}

/// One cached file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Entry name, as produced by the key generator
    pub key: String,
    /// Absolute location under the cache root
    pub path: PathBuf,
    /// Milliseconds since the Unix epoch; 0 when unknown
    pub timestamp: i64,
}

/// Point-in-time snapshot of a cache root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheState {
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheState {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.key.clone(), entry))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot restricted to the keys accepted by `keep`
    pub fn filter(&self, keep: impl Fn(&str) -> bool) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(key, _)| keep(key))
                .map(|(key, entry)| (key.clone(), entry.clone()))
                .collect(),
        }
    }

    /// Cached location of an artifact identity, if present in this snapshot
    pub fn locate(&self, identity: &str, kind: EntryKind) -> Option<&Path> {
        self.entries
            .get(&key_for(identity, kind))
            .map(|entry| entry.path.as_path())
    }
}

/// List the immediate children of `root` that follow `shape`
///
/// A missing root is an empty cache. Hidden names are staging leftovers
/// and are never reported.
pub fn scan(root: &Path, shape: &EntryShape) -> ArtcacheResult<CacheState> {
    let dir = match fs::read_dir(root) {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Cache root {} does not exist yet", root.display());
            return Ok(CacheState::empty());
        }
        Err(e) => {
            return Err(ArtcacheError::io(
                format!("listing cache root {}", root.display()),
                e,
            ))
        }
    };

    let mut entries = Vec::new();
    for child in dir {
        let child = child
            .map_err(|e| ArtcacheError::io(format!("listing cache root {}", root.display()), e))?;
        let Ok(name) = child.file_name().into_string() else {
            continue;
        };
        if !shape.matches_name(&name) {
            continue;
        }

        let path = child.path();
        // Entries may vanish between listing and stat; skip them
        let Ok(metadata) = fs::metadata(&path) else {
            continue;
        };

        let timestamp = match shape {
            EntryShape::FlatFile { .. } if metadata.is_file() => {
                millis(FileTime::from_last_modification_time(&metadata))
            }
            EntryShape::Directory { stamp, .. } if metadata.is_dir() => stamp_millis(&path, stamp),
            _ => continue,
        };

        entries.push(CacheEntry {
            key: name,
            path,
            timestamp,
        });
    }

    debug!("Scanned {} entries in {}", entries.len(), root.display());
    Ok(CacheState::from_entries(entries))
}

/// Stamp mtime of a directory entry, 0 when the stamp is missing
fn stamp_millis(dir: &Path, stamp: &str) -> i64 {
    fs::metadata(dir.join(stamp))
        .map(|metadata| millis(FileTime::from_last_modification_time(&metadata)))
        .unwrap_or(0)
}
