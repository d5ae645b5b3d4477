//! CLI argument definitions using clap derive

use crate::sync::SyncMode;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// artcache - local build-artifact cache
///
/// Mirrors build outputs (jars, source jars and Android archives) into a
/// local cache directory, copying only what changed.
#[derive(Parser, Debug)]
#[command(name = "artcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "ARTCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .artcache.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Cache root directory, overriding cache.root
    #[arg(long, global = true, env = "ARTCACHE_CACHE_ROOT")]
    pub cache_root: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize the caches with an artifact manifest
    Sync(SyncArgs),

    /// Update stale entries that are already cached
    Refresh(RefreshArgs),

    /// Print the cached path of an artifact
    Locate(LocateArgs),

    /// Show cached entries and sizes
    Status(StatusArgs),

    /// Delete every cached entry
    Clear(ClearArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Which caches a command touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheSelection {
    /// Class and source jars
    Jars,
    /// Unpacked Android archives and merged resources
    Aars,
}

/// `None` selects both caches
pub fn includes(only: Option<CacheSelection>, cache: CacheSelection) -> bool {
    only.is_none_or(|selected| selected == cache)
}

/// Arguments for the sync command
#[derive(Parser, Debug)]
pub struct SyncArgs {
    /// Artifact manifest (TOML)
    pub manifest: PathBuf,

    /// How undeclared entries are treated
    #[arg(short, long, value_enum, default_value_t = SyncMode::Incremental)]
    pub mode: SyncMode,

    /// Only synchronize one cache
    #[arg(long, value_enum)]
    pub only: Option<CacheSelection>,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the refresh command
#[derive(Parser, Debug)]
pub struct RefreshArgs {
    /// Artifact manifest (TOML)
    pub manifest: PathBuf,

    /// Only refresh one cache
    #[arg(long, value_enum)]
    pub only: Option<CacheSelection>,
}

/// What `locate` looks up
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LocateKind {
    /// Cached class jar
    Jar,
    /// Cached source jar
    SourceJar,
    /// Unpacked archive directory
    Aar,
    /// Resource directory of an unpacked archive
    Res,
    /// Class jar placed inside an unpacked archive
    ClassJar,
    /// Merged resources of a package (identity is the package name)
    Merged,
}

/// Arguments for the locate command
#[derive(Parser, Debug)]
pub struct LocateArgs {
    /// Artifact identity, or package name with --kind merged
    pub identity: String,

    /// Entry kind
    #[arg(short, long, value_enum, default_value = "jar")]
    pub kind: LocateKind,
}

/// Arguments for the status command
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Only show one cache
    #[arg(long, value_enum)]
    pub only: Option<CacheSelection>,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Only clear one cache
    #[arg(long, value_enum)]
    pub only: Option<CacheSelection>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.workers)
        key: String,
        /// Value to set
        value: String,
        /// Write to project-local .artcache.toml instead of global config
        #[arg(long)]
        local: bool,
    },
}

/// Output format for reports and listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
