//! Filesystem primitives for cache entries
//!
//! Writes go through a hidden sibling and a rename so readers never see a
//! half-written entry. Hidden names are skipped by the state reader.

use crate::error::{ArtcacheError, ArtcacheResult};
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Create the cache root if needed; failure aborts the pass
pub fn ensure_root(root: &Path) -> ArtcacheResult<()> {
    fs::create_dir_all(root).map_err(|e| ArtcacheError::CacheRootCreate {
        path: root.to_path_buf(),
        source: e,
    })
}

/// Hidden staging path next to `key` under `root`
pub fn staging_path(root: &Path, key: &str, suffix: &str) -> PathBuf {
    root.join(format!(".{}.{}{}", key, uuid::Uuid::new_v4().simple(), suffix))
}

/// Copy `src` into `root/key`, replacing any previous copy atomically
///
/// `mtime` is applied to the copy before it becomes visible.
pub fn copy_atomic(
    src: &Path,
    root: &Path,
    key: &str,
    mtime: Option<FileTime>,
) -> ArtcacheResult<PathBuf> {
    let dest = root.join(key);
    let tmp = staging_path(root, key, ".tmp");

    let result = (|| {
        let mut reader = BufReader::new(File::open(src)?);
        let mut writer = File::create(&tmp)?;
        io::copy(&mut reader, &mut writer)?;
        writer.sync_all()?;
        drop(writer);
        if let Some(mtime) = mtime {
            filetime::set_file_mtime(&tmp, mtime)?;
        }
        fs::rename(&tmp, &dest)
    })();

    match result {
        Ok(()) => {
            debug!("Copied {} -> {}", src.display(), dest.display());
            Ok(dest)
        }
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            Err(ArtcacheError::io(
                format!("copying {} to {}", src.display(), dest.display()),
                e,
            ))
        }
    }
}

/// Remove a cached file or directory; a missing entry is not an error
pub fn delete_entry(path: &Path) -> ArtcacheResult<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ArtcacheError::io(format!("removing {}", path.display()), e)),
    }
}

/// Result of emptying a cache root
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearOutcome {
    /// Visible entries deleted
    pub removed: usize,
    /// Children that could not be deleted
    pub failed: usize,
}

/// Delete every child of `root`, continuing past individual failures
pub fn clear_root(root: &Path) -> ClearOutcome {
    let mut outcome = ClearOutcome::default();
    let dir = match fs::read_dir(root) {
        Ok(dir) => dir,
        Err(e) if e.kind() == ErrorKind::NotFound => return outcome,
        Err(e) => {
            warn!("Could not list {}: {}", root.display(), e);
            outcome.failed += 1;
            return outcome;
        }
    };

    for child in dir.flatten() {
        let path = child.path();
        let hidden = child.file_name().to_string_lossy().starts_with('.');
        match delete_entry(&path) {
            Ok(()) if !hidden => outcome.removed += 1,
            Ok(()) => {}
            Err(e) => {
                warn!("{}", e);
                outcome.failed += 1;
            }
        }
    }
    outcome
}

/// Whether two files hold the same bytes
pub fn same_content(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }

    let mut left = BufReader::new(File::open(a)?);
    let mut right = BufReader::new(File::open(b)?);
    let mut left_buf = [0u8; 8192];
    let mut right_buf = [0u8; 8192];

    loop {
        let n = read_full(&mut left, &mut left_buf)?;
        let m = read_full(&mut right, &mut right_buf)?;
        if n != m || left_buf[..n] != right_buf[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Total size in bytes of a file, or of every file below a directory
pub fn entry_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|entry| entry.metadata().ok())
        .filter(|metadata| metadata.is_file())
        .map(|metadata| metadata.len())
        .sum()
}

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
