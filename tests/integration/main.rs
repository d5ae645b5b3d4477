//! Integration tests for artcache

use filetime::FileTime;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Workspace with a source tree, a manifest location and an isolated cache
struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("bin")).unwrap();
        Self { temp }
    }

    fn path(&self) -> &Path {
        self.temp.path()
    }

    fn cache_root(&self) -> PathBuf {
        self.path().join("cache")
    }

    fn manifest(&self) -> PathBuf {
        self.path().join("artifacts.toml")
    }

    fn write_manifest(&self, content: &str) {
        fs::write(self.manifest(), content).unwrap();
    }

    /// Write `bin/<name>` with the given mtime in seconds
    fn file(&self, name: &str, bytes: &[u8], secs: i64) -> PathBuf {
        let path = self.path().join("bin").join(name);
        fs::write(&path, bytes).unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(secs, 0)).unwrap();
        path
    }

    fn archive(&self, name: &str, members: &[(&str, &[u8])], secs: i64) -> PathBuf {
        let path = self.path().join("bin").join(name);
        let mut zip = ZipWriter::new(File::create(&path).unwrap());
        for (member, bytes) in members {
            zip.start_file(*member, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(secs, 0)).unwrap();
        path
    }

    fn jar_entries(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.cache_root().join("jars"))
            .map(|dir| {
                dir.flatten()
                    .map(|entry| entry.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

mod cli_tests {
    use super::*;
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn artcache(ws: &Workspace) -> Command {
        let mut cmd = cargo_bin_cmd!("artcache");
        cmd.env_remove("ARTCACHE_CONFIG")
            .env_remove("ARTCACHE_CACHE_ROOT")
            .env("ARTCACHE_PLAIN", "1")
            .current_dir(ws.path())
            .arg("--no-local")
            .arg("--config")
            .arg(ws.path().join("config.toml"))
            .arg("--cache-root")
            .arg(ws.cache_root());
        cmd
    }

    fn sync(ws: &Workspace, mode: &str) -> assert_cmd::assert::Assert {
        artcache(ws)
            .args(["sync", "--format", "plain", "--mode", mode])
            .arg(ws.manifest())
            .assert()
    }

    #[test]
    fn help_displays() {
        cargo_bin_cmd!("artcache")
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("local build-artifact cache"));
    }

    #[test]
    fn version_displays() {
        cargo_bin_cmd!("artcache")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("artcache"));
    }

    #[test]
    fn config_path_honors_flag() {
        let ws = Workspace::new();
        artcache(&ws)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let ws = Workspace::new();
        artcache(&ws)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[general]").and(predicate::str::contains("[cache.aars]")));
    }

    #[test]
    fn config_set_persists() {
        let ws = Workspace::new();
        artcache(&ws)
            .args(["config", "set", "cache.workers", "3"])
            .assert()
            .success();
        let saved = fs::read_to_string(ws.path().join("config.toml")).unwrap();
        assert!(saved.contains("workers = 3"));

        artcache(&ws)
            .args(["config", "set", "cache.nope", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown config key"));
    }

    #[test]
    fn sync_then_noop() {
        let ws = Workspace::new();
        ws.file("libfoo.jar", b"foo", 100_000);
        ws.write_manifest("[[jar]]\npath = \"bin/libfoo.jar\"\n");

        sync(&ws, "incremental")
            .success()
            .stdout(predicate::str::contains("jar: copied 1, removed 0, merged 0"));
        sync(&ws, "incremental")
            .success()
            .stdout(predicate::str::contains("jar: copied 0, removed 0, merged 0"));

        let entries = ws.jar_entries();
        assert_eq!(entries.len(), 1);
        let cached = ws.cache_root().join("jars").join(&entries[0]);
        let mtime = FileTime::from_last_modification_time(&fs::metadata(cached).unwrap());
        assert_eq!(mtime.unix_seconds(), 100_000);
    }

    #[test]
    fn partial_keeps_and_incremental_prunes_obsolete() {
        let ws = Workspace::new();
        ws.file("libfoo.jar", b"foo", 100_000);
        ws.write_manifest("[[jar]]\npath = \"bin/libfoo.jar\"\n");
        fs::create_dir_all(ws.cache_root().join("jars")).unwrap();
        fs::write(ws.cache_root().join("jars/obsolete.jar"), b"old").unwrap();

        sync(&ws, "partial")
            .success()
            .stdout(predicate::str::contains("jar: copied 1, removed 0, merged 0"));
        assert!(ws.cache_root().join("jars/obsolete.jar").exists());

        sync(&ws, "incremental")
            .success()
            .stdout(predicate::str::contains("jar: copied 0, removed 1, merged 0"));
        assert!(!ws.cache_root().join("jars/obsolete.jar").exists());
    }

    #[test]
    fn locate_prints_cached_path() {
        let ws = Workspace::new();
        ws.file("libfoo.jar", b"foo", 100_000);
        ws.write_manifest("[[jar]]\npath = \"bin/libfoo.jar\"\n");
        sync(&ws, "incremental").success();

        artcache(&ws)
            .args(["locate", "bin/libfoo.jar"])
            .assert()
            .success()
            .stdout(predicate::str::contains("libfoo_").and(predicate::str::contains(".jar")));

        artcache(&ws)
            .args(["locate", "bin/other.jar"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No cached entry for bin/other.jar"));
    }

    #[test]
    fn aar_sync_unpacks_and_merges() {
        let ws = Workspace::new();
        ws.archive("a.aar", &[("classes.jar", b"c"), ("res/values/values.xml", b"<a/>")], 100);
        ws.archive("b.aar", &[("res/values/values.xml", b"<b/>")], 100);
        ws.file("a_merged.jar", b"merged", 100);
        ws.write_manifest(
            r#"
            [[aar]]
            aar = { path = "bin/a.aar" }
            jar = { path = "bin/a_merged.jar" }
            package = "com.example.ui"

            [[aar]]
            aar = { path = "bin/b.aar" }
            package = "com.example.ui"
            "#,
        );

        artcache(&ws)
            .args(["sync", "--format", "plain", "--only", "aars"])
            .arg(ws.manifest())
            .assert()
            .success()
            .stdout(predicate::str::contains("aar: copied 2, removed 0, merged 1"));

        artcache(&ws)
            .args(["locate", "--kind", "class-jar", "bin/a.aar"])
            .assert()
            .success()
            .stdout(predicate::str::contains("classes_and_libs_merged.jar"));
        artcache(&ws)
            .args(["locate", "--kind", "merged", "com.example.ui"])
            .assert()
            .success()
            .stdout(predicate::str::contains(".mergedaar"));
    }

    #[test]
    fn status_json_lists_entries() {
        let ws = Workspace::new();
        ws.file("libfoo.jar", b"foo", 100_000);
        ws.write_manifest("[[jar]]\npath = \"bin/libfoo.jar\"\n");
        sync(&ws, "incremental").success();

        let output = artcache(&ws)
            .args(["status", "--format", "json", "--only", "jars"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let rows = rows.as_array().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["cache"], "jar");
        assert_eq!(rows[0]["size_bytes"], 3);
    }

    #[test]
    fn clear_requires_confirmation() {
        let ws = Workspace::new();
        ws.file("libfoo.jar", b"foo", 100_000);
        ws.write_manifest("[[jar]]\npath = \"bin/libfoo.jar\"\n");
        sync(&ws, "incremental").success();

        artcache(&ws)
            .arg("clear")
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing cleared"));
        assert_eq!(ws.jar_entries().len(), 1);

        artcache(&ws)
            .args(["clear", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed 1 entries"));
        assert!(ws.jar_entries().is_empty());
    }

    #[test]
    fn missing_manifest_fails() {
        let ws = Workspace::new();
        sync(&ws, "incremental")
            .failure()
            .stderr(predicate::str::contains("Path not found"));
    }

    #[test]
    fn invalid_manifest_fails() {
        let ws = Workspace::new();
        ws.write_manifest("[[jar]]\nsource_jars = []\n");
        sync(&ws, "incremental")
            .failure()
            .stderr(predicate::str::contains("Invalid artifact manifest"));
    }

    #[test]
    fn disabled_jar_cache_is_emptied() {
        let ws = Workspace::new();
        ws.file("libfoo.jar", b"foo", 100_000);
        ws.write_manifest("[[jar]]\npath = \"bin/libfoo.jar\"\n");
        sync(&ws, "incremental").success();

        fs::write(ws.path().join("config.toml"), "[cache.jars]\nenabled = false\n").unwrap();
        sync(&ws, "incremental")
            .success()
            .stdout(predicate::str::contains("jar: copied 0, removed 1, merged 0"));
        assert!(ws.jar_entries().is_empty());
    }
}

mod sync_tests {
    use super::*;
    use artcache::cache::{CancelToken, EntryKind, Executor};
    use artcache::fetch::SchemeFetcher;
    use artcache::sync::jars::cached_jar;
    use artcache::sync::{JarCache, JarLayout, JarLibrary, SyncMode, SyncRequest, Synchronizer};
    use artcache::Artifact;
    use std::sync::Arc;
    use std::time::Duration;

    fn jar_cache(ws: &Workspace) -> JarCache {
        Synchronizer::new(
            ws.cache_root().join("jars"),
            JarLayout,
            Arc::new(SchemeFetcher::new(Duration::from_secs(5))),
            Executor::new(4, CancelToken::new()),
        )
    }

    #[tokio::test]
    async fn touching_one_source_recopies_only_that_entry() {
        let ws = Workspace::new();
        let libs: Vec<JarLibrary> = ["a", "b", "c"]
            .iter()
            .map(|name| {
                let path = ws.file(&format!("{}.jar", name), name.as_bytes(), 100);
                JarLibrary::new(Artifact::local_output(format!("bin/{}.jar", name), path))
            })
            .collect();
        let cache = jar_cache(&ws);

        let first = cache.sync(SyncRequest::new(libs.clone(), SyncMode::Incremental)).await.unwrap();
        assert_eq!(first.report.copied, 3);

        ws.file("b.jar", b"b2", 200);
        let second = cache.sync(SyncRequest::new(libs.clone(), SyncMode::Incremental)).await.unwrap();
        assert_eq!(second.report.to_string(), "copied 1, removed 0, merged 0");

        let cached = cached_jar(&second.state, &libs[1].jar).unwrap();
        assert_eq!(fs::read(cached).unwrap(), b"b2");
    }

    #[tokio::test]
    async fn remote_outputs_are_fetched_and_reported() {
        let ws = Workspace::new();
        let blob = ws.file("blob", b"remote-bytes", 100);
        let remote = Artifact::remote_output("bin/libnet.jar", format!("file://{}", blob.display()));
        let libs = vec![JarLibrary::new(remote.clone())];
        let cache = jar_cache(&ws);

        let first = cache.sync(SyncRequest::new(libs.clone(), SyncMode::Incremental)).await.unwrap();
        assert_eq!(first.report.copied, 1);
        assert!(first.report.remote_identities.contains("bin/libnet.jar"));
        let path = first.state.locate("bin/libnet.jar", EntryKind::Jar).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"remote-bytes");

        let second = cache
            .sync(SyncRequest::new(libs, SyncMode::Incremental).with_previously_remote(first.report.remote_identities))
            .await
            .unwrap();
        assert_eq!(second.report.copied, 0);
    }

    #[tokio::test]
    async fn full_mode_rebuilds_from_scratch() {
        let ws = Workspace::new();
        let path = ws.file("a.jar", b"a", 100);
        let libs = vec![JarLibrary::new(Artifact::local_output("bin/a.jar", path))];
        let cache = jar_cache(&ws);
        cache.sync(SyncRequest::new(libs.clone(), SyncMode::Incremental)).await.unwrap();

        let full = cache.sync(SyncRequest::new(libs, SyncMode::Full)).await.unwrap();
        assert_eq!(full.report.to_string(), "copied 1, removed 1, merged 0");
        assert_eq!(full.state.len(), 1);
    }

    #[tokio::test]
    async fn unwritable_root_is_fatal() {
        let ws = Workspace::new();
        let blocker = ws.path().join("cache");
        fs::write(&blocker, b"not a directory").unwrap();
        let cache = jar_cache(&ws);

        let err = cache.sync(SyncRequest::new(Vec::new(), SyncMode::Incremental)).await.unwrap_err();
        assert!(err.to_string().contains("Could not create cache directory"));
    }
}
