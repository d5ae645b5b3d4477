//! Resource merging for archives that share a package
//!
//! Every member's unpacked directory is walked in a fixed order and its
//! resource files are copied to the same relative path in one merged
//! directory. Collisions never fail the merge:
//!
//! | Collision | Result |
//! |-----------|--------|
//! | `AndroidManifest.xml` | first copy kept |
//! | identical bytes | first copy kept |
//! | different bytes | later copy renamed `<name>-<member>.<ext>` |
//!
//! The merged directory also records the entry names of its members in
//! `aar.members`, so a pass that only sees some of them can still rebuild
//! the whole group.

use crate::cache::fs::{delete_entry, same_content, staging_path};
use crate::error::{ArtcacheError, ArtcacheResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Manifest marker, assumed redundant across members
pub const MANIFEST: &str = "AndroidManifest.xml";

/// Member record inside a merged directory, one entry name per line
pub const MEMBERS_FILE: &str = "aar.members";

/// Extensions of files that take part in a merge
pub const RESOURCE_EXTENSIONS: &[&str] = &["xml"];

/// One unpacked archive contributing to a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeMember {
    /// Cache key of the member without its suffix, used to rename conflicts
    pub key_stem: String,
    /// The member's unpacked directory
    pub dir: PathBuf,
}

/// Result of merging one group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged directory, `None` when no member contributed a file
    pub path: Option<PathBuf>,
    pub files: usize,
    pub renamed: usize,
    /// Per-file failures, already reported as one warning
    pub problems: Vec<String>,
}

/// Recreate `dest` from the resource files of `members`
pub fn merge_group(group: &str, dest: &Path, members: &[MergeMember]) -> ArtcacheResult<MergeOutcome> {
    let merge_err = |reason: String| ArtcacheError::Merge {
        group: group.to_string(),
        reason,
    };
    let parent = dest
        .parent()
        .ok_or_else(|| merge_err("destination has no parent directory".to_string()))?;
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = staging_path(parent, &name, ".partial");
    fs::create_dir_all(&staging).map_err(|e| merge_err(format!("creating staging directory: {}", e)))?;

    let mut outcome = MergeOutcome::default();
    for member in members {
        merge_member(member, &staging, &mut outcome);
    }

    let finished = if outcome.files == 0 {
        let _ = fs::remove_dir_all(&staging);
        delete_entry(dest).map(|()| None)
    } else {
        record_members(&staging, members).and_then(|()| delete_entry(dest)).and_then(|()| {
            fs::rename(&staging, dest)
                .map(|()| Some(dest.to_path_buf()))
                .map_err(|e| ArtcacheError::io(format!("moving merged {} into place", name), e))
        })
    };
    outcome.path = match finished {
        Ok(path) => path,
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            return Err(merge_err(e.to_string()));
        }
    };

    if !outcome.problems.is_empty() {
        warn!(
            "Merging {} skipped {} file(s): {}",
            group,
            outcome.problems.len(),
            outcome.problems.join("; ")
        );
    }
    debug!(
        "Merged {} member(s) of {}: {} file(s), {} renamed",
        members.len(),
        group,
        outcome.files,
        outcome.renamed
    );
    Ok(outcome)
}

fn record_members(staging: &Path, members: &[MergeMember]) -> ArtcacheResult<()> {
    let names: Vec<String> = members
        .iter()
        .filter_map(|member| member.dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    let path = staging.join(MEMBERS_FILE);
    fs::write(&path, names.join("\n") + "\n")
        .map_err(|e| ArtcacheError::io(format!("writing {}", path.display()), e))
}

/// Entry names recorded by the last merge into `dir`; empty when unknown
pub fn recorded_members(dir: &Path) -> Vec<String> {
    let Ok(content) = fs::read_to_string(dir.join(MEMBERS_FILE)) else {
        return Vec::new();
    };
    content
        .lines()
        .map(str::trim)
        .filter(|name| !name.is_empty() && !name.starts_with('.') && !name.contains(['/', '\\']))
        .map(str::to_string)
        .collect()
}

fn merge_member(member: &MergeMember, staging: &Path, outcome: &mut MergeOutcome) {
    let walker = WalkDir::new(&member.dir).sort_by_file_name().into_iter();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                outcome.problems.push(e.to_string());
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_resource(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(&member.dir) else {
            continue;
        };

        match place(entry.path(), staging, relative, &member.key_stem) {
            Ok(Placement::Copied) => outcome.files += 1,
            Ok(Placement::Renamed) => {
                outcome.files += 1;
                outcome.renamed += 1;
            }
            Ok(Placement::Skipped) => {}
            Err(e) => outcome
                .problems
                .push(format!("{}: {}", entry.path().display(), e)),
        }
    }
}

enum Placement {
    Copied,
    Renamed,
    Skipped,
}

fn place(source: &Path, staging: &Path, relative: &Path, key_stem: &str) -> std::io::Result<Placement> {
    let target = staging.join(relative);
    if !target.exists() {
        copy_file(source, &target)?;
        return Ok(Placement::Copied);
    }

    if relative.file_name().is_some_and(|n| n == MANIFEST) {
        return Ok(Placement::Skipped);
    }
    if same_content(source, &target)? {
        return Ok(Placement::Skipped);
    }

    let renamed = target.with_file_name(conflict_name(&target, key_stem));
    if renamed.exists() && same_content(source, &renamed)? {
        return Ok(Placement::Skipped);
    }
    copy_file(source, &renamed)?;
    Ok(Placement::Renamed)
}

/// `values.xml` from member `lib_0123` becomes `values-lib_0123.xml`
fn conflict_name(target: &Path, key_stem: &str) -> String {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match target.extension() {
        Some(ext) => format!("{}-{}.{}", stem, key_stem, ext.to_string_lossy()),
        None => format!("{}-{}", stem, key_stem),
    }
}

fn copy_file(source: &Path, target: &Path) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target).map(|_| ())
}

fn is_resource(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| RESOURCE_EXTENSIONS.contains(&ext))
}
