//! Configuration schema for artcache
//!
//! Configuration is stored at `~/.config/artcache/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache settings
    pub cache: CacheConfig,

    /// Remote artifact settings
    pub fetch: FetchConfig,
}

impl Config {
    /// Cache root from config, falling back to the platform cache directory
    pub fn cache_root(&self) -> PathBuf {
        self.cache.root.clone().unwrap_or_else(default_cache_root)
    }
}

/// Default location of the cache directories
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("artcache")
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding `jars/` and `aars/` (default: platform cache dir)
    pub root: Option<PathBuf>,

    /// Maximum concurrent copy, unpack and fetch operations
    pub workers: usize,

    /// Jar cache settings
    pub jars: JarCacheConfig,

    /// Android archive cache settings
    pub aars: AarCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            root: None,
            workers: 8,
            jars: JarCacheConfig::default(),
            aars: AarCacheConfig::default(),
        }
    }
}

/// Jar cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JarCacheConfig {
    /// Cache jars locally (default: true); a disabled cache is emptied
    pub enabled: bool,
}

impl Default for JarCacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Android archive cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AarCacheConfig {
    /// Unpack archives locally (default: true); a disabled cache is emptied
    pub enabled: bool,

    /// Merge resources of archives sharing a package (default: true)
    pub merge: bool,
}

impl Default for AarCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            merge: true,
        }
    }
}

/// Remote fetch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout for one remote download in seconds
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { timeout_secs: 120 }
    }
}
