//! Archive extraction into directory entries
//!
//! An entry is never patched. Members are extracted into a hidden staging
//! directory next to the destination, extras and the stamp are added, and
//! only then is the old directory replaced. A failed extraction leaves the
//! previous entry (or nothing) in place and removes the staging directory.

use crate::cache::fs::{delete_entry, staging_path};
use crate::error::{ArtcacheError, ArtcacheResult};
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

/// Marker file whose mtime records the source archive's mtime
#[derive(Debug, Clone, Copy)]
pub struct Stamp<'a> {
    pub name: &'a str,
    /// `None` leaves the stamp at extraction time
    pub mtime: Option<FileTime>,
}

/// A file supplied separately and placed inside the unpacked directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraFile {
    pub source: PathBuf,
    /// Location relative to the unpacked directory
    pub relative: PathBuf,
}

/// Extract `archive` into `dest`, skipping members accepted by `exclude`
pub fn unpack(
    archive: &Path,
    dest: &Path,
    exclude: impl Fn(&Path) -> bool,
    stamp: Stamp<'_>,
    extras: &[ExtraFile],
) -> ArtcacheResult<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| ArtcacheError::archive(dest, "destination has no parent directory"))?;
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = staging_path(parent, &name, ".partial");

    let result = populate(archive, &staging, &exclude, stamp, extras).and_then(|count| {
        delete_entry(dest)?;
        fs::rename(&staging, dest)
            .map_err(|e| ArtcacheError::io(format!("moving unpacked {} into place", name), e))?;
        Ok(count)
    });

    match result {
        Ok(count) => {
            debug!("Unpacked {} member(s) of {} into {}", count, archive.display(), dest.display());
            Ok(())
        }
        Err(e) => {
            let _ = fs::remove_dir_all(&staging);
            Err(e)
        }
    }
}

/// Fill the staging directory; returns the number of extracted members
fn populate(
    archive: &Path,
    staging: &Path,
    exclude: &impl Fn(&Path) -> bool,
    stamp: Stamp<'_>,
    extras: &[ExtraFile],
) -> ArtcacheResult<usize> {
    fs::create_dir_all(staging)
        .map_err(|e| ArtcacheError::io(format!("creating {}", staging.display()), e))?;

    let file = File::open(archive)
        .map_err(|e| ArtcacheError::io(format!("opening {}", archive.display()), e))?;
    let mut zip = ZipArchive::new(BufReader::new(file)).map_err(|e| ArtcacheError::archive(archive, e))?;

    let mut extracted = 0;
    for index in 0..zip.len() {
        let mut member = zip.by_index(index).map_err(|e| ArtcacheError::archive(archive, e))?;
        let Some(relative) = member.enclosed_name() else {
            return Err(ArtcacheError::archive(
                archive,
                format!("member {} escapes the archive root", member.name()),
            ));
        };
        if exclude(relative.as_path()) {
            continue;
        }

        let target = staging.join(&relative);
        if member.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| ArtcacheError::io(format!("creating {}", target.display()), e))?;
            continue;
        }
        create_parent(&target)?;
        let mut out = File::create(&target)
            .map_err(|e| ArtcacheError::io(format!("creating {}", target.display()), e))?;
        io::copy(&mut member, &mut out).map_err(|e| ArtcacheError::archive(archive, e))?;
        extracted += 1;
    }

    for extra in extras {
        let target = staging.join(&extra.relative);
        create_parent(&target)?;
        fs::copy(&extra.source, &target)
            .map_err(|e| ArtcacheError::io(format!("copying {}", extra.source.display()), e))?;
    }

    let stamp_path = staging.join(stamp.name);
    File::create(&stamp_path)
        .map_err(|e| ArtcacheError::io(format!("writing {}", stamp_path.display()), e))?;
    if let Some(mtime) = stamp.mtime {
        filetime::set_file_mtime(&stamp_path, mtime)
            .map_err(|e| ArtcacheError::io(format!("stamping {}", stamp_path.display()), e))?;
    }

    Ok(extracted)
}

fn create_parent(path: &Path) -> ArtcacheResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ArtcacheError::io(format!("creating {}", parent.display()), e))?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    /// Write a zip holding `members` (name, contents)
    pub(crate) fn write_zip(path: &Path, members: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, contents) in members {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap();
    }

    fn no_stamp_time() -> Stamp<'static> {
        Stamp {
            name: "aar.timestamp",
            mtime: None,
        }
    }

    #[test]
    fn extracts_members_and_stamp() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("lib.aar");
        write_zip(
            &archive,
            &[
                ("AndroidManifest.xml", b"<manifest/>"),
                ("res/values/values.xml", b"<resources/>"),
            ],
        );
        let dest = temp.path().join("cache/lib_01.aar");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();

        let stamp = Stamp {
            name: "aar.timestamp",
            mtime: Some(FileTime::from_unix_time(1234, 0)),
        };
        unpack(&archive, &dest, |_| false, stamp, &[]).unwrap();

        assert_eq!(fs::read(dest.join("res/values/values.xml")).unwrap(), b"<resources/>");
        let stamp_meta = fs::metadata(dest.join("aar.timestamp")).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&stamp_meta).unix_seconds(), 1234);
    }

    #[test]
    fn excluded_members_are_skipped() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("lib.aar");
        write_zip(
            &archive,
            &[("classes.jar", b"cls"), ("lint.jar", b"lint"), ("R.txt", b"r")],
        );
        let dest = temp.path().join("lib_01.aar");

        let exclude = |p: &Path| p.extension().is_some_and(|e| e == "jar") && p != Path::new("lint.jar");
        unpack(&archive, &dest, exclude, no_stamp_time(), &[]).unwrap();

        assert!(!dest.join("classes.jar").exists());
        assert!(dest.join("lint.jar").exists());
        assert!(dest.join("R.txt").exists());
    }

    #[test]
    fn extras_are_placed() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("lib.aar");
        write_zip(&archive, &[("R.txt", b"r")]);
        let jar = temp.path().join("merged.jar");
        fs::write(&jar, b"merged").unwrap();
        let dest = temp.path().join("lib_01.aar");

        let extras = [ExtraFile {
            source: jar,
            relative: PathBuf::from("jars/classes_and_libs_merged.jar"),
        }];
        unpack(&archive, &dest, |_| false, no_stamp_time(), &extras).unwrap();

        assert_eq!(
            fs::read(dest.join("jars/classes_and_libs_merged.jar")).unwrap(),
            b"merged"
        );
    }

    #[test]
    fn recreates_instead_of_patching() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("lib.aar");
        let dest = temp.path().join("lib_01.aar");
        fs::create_dir_all(dest.join("res")).unwrap();
        fs::write(dest.join("res/old.xml"), b"old").unwrap();
        write_zip(&archive, &[("res/new.xml", b"new")]);

        unpack(&archive, &dest, |_| false, no_stamp_time(), &[]).unwrap();

        assert!(!dest.join("res/old.xml").exists());
        assert!(dest.join("res/new.xml").exists());
    }

    #[test]
    fn corrupt_archive_leaves_previous_entry() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.aar");
        fs::write(&archive, b"not a zip").unwrap();
        let dest = temp.path().join("lib_01.aar");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("kept.xml"), b"kept").unwrap();

        let err = unpack(&archive, &dest, |_| false, no_stamp_time(), &[]).unwrap_err();
        assert!(matches!(err, ArtcacheError::Archive { .. }));
        assert!(dest.join("kept.xml").exists());

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn escaping_member_is_rejected() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("evil.aar");
        write_zip(&archive, &[("../escape.xml", b"x")]);
        let dest = temp.path().join("cache/evil_01.aar");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();

        assert!(unpack(&archive, &dest, |_| false, no_stamp_time(), &[]).is_err());
        assert!(!dest.exists());
        assert!(!temp.path().join("cache/escape.xml").exists());
    }
}
