//! artcache - local build-artifact cache synchronizer
//!
//! Mirrors jars, source jars and Android archives produced by a build into
//! a local cache directory, copying or unpacking only what changed and
//! merging resources of archives that share a package.

pub mod artifact;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod manifest;
pub mod sync;
pub mod ui;

pub use artifact::{Artifact, ArtifactSource, CacheItem};
pub use error::{ArtcacheError, ArtcacheResult};
pub use sync::{SyncMode, SyncReport, SyncRequest, Synchronizer};
