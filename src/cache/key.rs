//! Cache key generation
//!
//! Keys combine a readable stem taken from the artifact's file name with a
//! short SHA256 of the full identity. Same identity = same key, and two
//! `libfoo.jar` files from different packages never collide.

use sha2::{Digest, Sha256};
use std::fmt;

/// Number of hash bytes kept in a key (16 hex chars)
const HASH_BYTES: usize = 8;

/// Longest stem kept before the hash
const MAX_STEM_LEN: usize = 64;

/// Kind of cache entry, which determines the key suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Class jar, cached as a flat file
    Jar,
    /// Source jar, cached as a flat file
    SourceJar,
    /// Unpacked archive directory
    Aar,
    /// Merged resource directory for a group of archives
    MergedAar,
}

impl EntryKind {
    /// Suffix appended after the hash
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Jar => ".jar",
            Self::SourceJar => "-src.jar",
            Self::Aar => ".aar",
            Self::MergedAar => ".mergedaar",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jar => "jar",
            Self::SourceJar => "source-jar",
            Self::Aar => "aar",
            Self::MergedAar => "merged",
        };
        write!(f, "{}", name)
    }
}

/// Cache key for an artifact identity
pub fn key_for(identity: &str, kind: EntryKind) -> String {
    format!(
        "{}_{}{}",
        sanitize(file_stem(identity)),
        short_hash(identity),
        kind.suffix()
    )
}

/// Cache key for a merge group (e.g. a resource package name)
pub fn group_key(group: &str) -> String {
    format!(
        "{}_{}{}",
        sanitize(group),
        short_hash(group),
        EntryKind::MergedAar.suffix()
    )
}

/// Strip a key's suffix, leaving `<stem>_<hash>`
pub fn key_stem(key: &str) -> &str {
    [EntryKind::SourceJar, EntryKind::MergedAar, EntryKind::Jar, EntryKind::Aar]
        .iter()
        .find_map(|kind| key.strip_suffix(kind.suffix()))
        .unwrap_or(key)
}

/// Hex of the first bytes of SHA256(identity)
fn short_hash(identity: &str) -> String {
    let digest = Sha256::digest(identity.as_bytes());
    hex::encode(&digest[..HASH_BYTES])
}

/// Final path segment with its extension removed
fn file_stem(identity: &str) -> &str {
    let name = identity
        .rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or("");
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Restrict to characters that are safe in a single path segment
fn sanitize(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '+') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_STEM_LEN)
        .collect();
    // A leading dot would hide the entry from the state reader
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "artifact".to_string()
    } else {
        cleaned.to_string()
    }
}
