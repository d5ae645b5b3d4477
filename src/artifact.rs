//! Build artifacts supplied by the build model
//!
//! An artifact is an immutable handle: a stable identity string plus a
//! source that is either a file on local disk or a remote reference whose
//! bytes are materialized by a [`Fetcher`](crate::fetch::Fetcher).

use filetime::FileTime;
use std::fmt;
use std::path::{Path, PathBuf};

/// Where an artifact's bytes live
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactSource {
    /// File readable on local disk
    Local(PathBuf),
    /// Remote output, fetched before use
    Remote(RemoteArtifact),
}

/// Reference to a remote build output
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteArtifact {
    /// Location understood by the configured fetcher (e.g. an https URL)
    pub uri: String,
}

/// A build output or source file that may be cached
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Artifact {
    identity: String,
    source: ArtifactSource,
}

impl Artifact {
    /// A source-controlled file, identified by its workspace path
    pub fn source_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            identity: path.to_string_lossy().into_owned(),
            source: ArtifactSource::Local(path),
        }
    }

    /// A build output available on local disk under the given output key
    pub fn local_output(identity: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            identity: identity.into(),
            source: ArtifactSource::Local(path.into()),
        }
    }

    /// A build output that only exists in a remote store
    pub fn remote_output(identity: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            source: ArtifactSource::Remote(RemoteArtifact { uri: uri.into() }),
        }
    }

    /// Stable identity string derived from the build-graph location
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn source(&self) -> &ArtifactSource {
        &self.source
    }

    pub fn is_remote(&self) -> bool {
        matches!(self.source, ArtifactSource::Remote(_))
    }

    /// Local path, if the artifact is backed by a local file
    pub fn local_path(&self) -> Option<&Path> {
        match &self.source {
            ArtifactSource::Local(path) => Some(path),
            ArtifactSource::Remote(_) => None,
        }
    }

    /// Modification time of a local source, `None` for remote or unreadable sources
    pub fn modified(&self) -> Option<FileTime> {
        let path = self.local_path()?;
        let metadata = std::fs::metadata(path).ok()?;
        Some(FileTime::from_last_modification_time(&metadata))
    }

    /// Modification time in milliseconds since the Unix epoch
    pub fn modified_millis(&self) -> Option<i64> {
        self.modified().map(millis)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ArtifactSource::Local(path) => write!(f, "{} ({})", self.identity, path.display()),
            ArtifactSource::Remote(remote) => write!(f, "{} ({})", self.identity, remote.uri),
        }
    }
}

/// Something the synchronizer can cache, keyed on its primary artifact
pub trait CacheItem: Clone + Send + Sync + 'static {
    /// Artifact whose identity and timestamp drive the diff
    fn primary(&self) -> &Artifact;

    /// Every artifact needed to populate the entry (primary first)
    fn inputs(&self) -> Vec<&Artifact> {
        vec![self.primary()]
    }
}

impl CacheItem for Artifact {
    fn primary(&self) -> &Artifact {
        self
    }
}

/// Convert a file time to milliseconds since the Unix epoch
pub fn millis(time: FileTime) -> i64 {
    time.unix_seconds() * 1000 + i64::from(time.nanoseconds() / 1_000_000)
}
