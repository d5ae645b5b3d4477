//! Error types for artcache
//!
//! All modules use `ArtcacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for artcache operations
pub type ArtcacheResult<T> = Result<T, ArtcacheError>;

/// All errors that can occur in artcache
#[derive(Error, Debug)]
pub enum ArtcacheError {
    // Cache errors
    #[error("Could not create cache directory {path}: {source}")]
    CacheRootCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to extract archive {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Failed to merge resources for {group}: {reason}")]
    Merge { group: String, reason: String },

    #[error("Failed to fetch remote artifact {uri}: {reason}")]
    Fetch { uri: String, reason: String },

    #[error("Remote artifact {0} was not materialized locally")]
    NotMaterialized(String),

    #[error("Synchronization was interrupted")]
    Interrupted,

    #[error("No cached entry for {0}")]
    NotCached(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ArtcacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an archive error for the given archive path
    pub fn archive(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Archive {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a fetch error for a remote URI
    pub fn fetch(uri: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error is a user- or signal-initiated stop rather than a failure
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CacheRootCreate { .. } => {
                Some("Check permissions or set cache.root in the configuration")
            }
            Self::Interrupted => Some("Run the sync again to finish updating the cache"),
            Self::NotCached(_) => Some("Run: artcache sync <manifest>"),
            _ => None,
        }
    }
}
