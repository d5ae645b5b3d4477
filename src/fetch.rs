//! Materializing remote artifacts on local disk
//!
//! Remote outputs are fetched into a per-pass scratch directory before any
//! copy or unpack runs. Everything downstream of this module sees local
//! paths only.

use crate::artifact::{Artifact, ArtifactSource, RemoteArtifact};
use crate::cache::executor::{blocking, Executor, Phase, UnitFailure};
use crate::error::{ArtcacheError, ArtcacheResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Source of remote artifact bytes
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Write the remote artifact's bytes to `dest`
    async fn fetch(&self, remote: &RemoteArtifact, dest: &Path) -> ArtcacheResult<()>;

    /// Get the human-readable fetcher name for display
    fn fetcher_name(&self) -> &'static str;
}

/// Fetches `http://` and `https://` URIs
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { agent }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, remote: &RemoteArtifact, dest: &Path) -> ArtcacheResult<()> {
        let agent = self.agent.clone();
        let uri = remote.uri.clone();
        let dest = dest.to_path_buf();
        blocking(move || {
            let mut response = agent
                .get(&uri)
                .call()
                .map_err(|e| ArtcacheError::fetch(&uri, e))?;
            let mut reader = response.body_mut().as_reader();
            let mut file = File::create(&dest)
                .map_err(|e| ArtcacheError::io(format!("creating {}", dest.display()), e))?;
            io::copy(&mut reader, &mut file).map_err(|e| ArtcacheError::fetch(&uri, e))?;
            Ok(())
        })
        .await
    }

    fn fetcher_name(&self) -> &'static str {
        "http"
    }
}

/// Reads `file://` URIs, for outputs mirrored to a shared filesystem
pub struct FileFetcher;

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self, remote: &RemoteArtifact, dest: &Path) -> ArtcacheResult<()> {
        let source = remote
            .uri
            .strip_prefix("file://")
            .ok_or_else(|| ArtcacheError::fetch(&remote.uri, "not a file:// URI"))?;
        tokio::fs::copy(source, dest)
            .await
            .map_err(|e| ArtcacheError::fetch(&remote.uri, e))?;
        Ok(())
    }

    fn fetcher_name(&self) -> &'static str {
        "file"
    }
}

/// Dispatches on the URI scheme
pub struct SchemeFetcher {
    http: HttpFetcher,
    file: FileFetcher,
}

impl SchemeFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: HttpFetcher::new(timeout),
            file: FileFetcher,
        }
    }
}

#[async_trait]
impl Fetcher for SchemeFetcher {
    async fn fetch(&self, remote: &RemoteArtifact, dest: &Path) -> ArtcacheResult<()> {
        let uri = remote.uri.as_str();
        if uri.starts_with("http://") || uri.starts_with("https://") {
            self.http.fetch(remote, dest).await
        } else if uri.starts_with("file://") {
            self.file.fetch(remote, dest).await
        } else {
            Err(ArtcacheError::fetch(uri, "unsupported URI scheme"))
        }
    }

    fn fetcher_name(&self) -> &'static str {
        "scheme"
    }
}

/// Local paths for every artifact input of a pass
#[derive(Debug, Clone, Default)]
pub struct LocalInputs {
    fetched: BTreeMap<String, PathBuf>,
}

impl LocalInputs {
    /// Local path of `artifact`, fetched or original
    pub fn resolve(&self, artifact: &Artifact) -> ArtcacheResult<PathBuf> {
        match artifact.source() {
            ArtifactSource::Local(path) => Ok(path.clone()),
            ArtifactSource::Remote(_) => self
                .fetched
                .get(artifact.identity())
                .cloned()
                .ok_or_else(|| ArtcacheError::NotMaterialized(artifact.identity().to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.fetched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetched.is_empty()
    }
}

/// Create a unique scratch directory for one pass
pub async fn create_scratch_dir() -> ArtcacheResult<PathBuf> {
    let dir = std::env::temp_dir()
        .join("artcache-fetch")
        .join(uuid::Uuid::new_v4().to_string());
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ArtcacheError::io("creating fetch directory", e))?;
    Ok(dir)
}

/// Fetch every remote artifact in `artifacts` into `scratch`
///
/// Local artifacts are skipped. A failed fetch is reported and leaves the
/// artifact unresolved, so the entries that need it fail individually.
pub async fn materialize(
    fetcher: Arc<dyn Fetcher>,
    executor: &Executor,
    artifacts: Vec<Artifact>,
    scratch: &Path,
) -> ArtcacheResult<(LocalInputs, Vec<UnitFailure>)> {
    let mut seen = BTreeMap::new();
    for artifact in artifacts {
        if let ArtifactSource::Remote(remote) = artifact.source() {
            seen.entry(artifact.identity().to_string())
                .or_insert_with(|| remote.clone());
        }
    }

    let units = seen
        .into_iter()
        .map(|(identity, remote)| {
            let fetcher = fetcher.clone();
            let dest = scratch.join(uuid::Uuid::new_v4().simple().to_string());
            let unit = async move {
                debug!("Fetching {} via {}", remote.uri, fetcher.fetcher_name());
                fetcher.fetch(&remote, &dest).await?;
                Ok::<_, ArtcacheError>(dest)
            };
            (identity, unit)
        })
        .collect();

    let outcome = executor.run(Phase::Fetch, units).await?;
    let inputs = LocalInputs {
        fetched: outcome.succeeded.into_iter().collect(),
    };
    Ok((inputs, outcome.failed))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::CancelToken;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves remote artifacts from an in-memory map
    #[derive(Default)]
    pub(crate) struct MemoryFetcher {
        pub(crate) blobs: BTreeMap<String, Vec<u8>>,
        pub(crate) calls: AtomicUsize,
    }

    impl MemoryFetcher {
        pub(crate) fn with(blobs: &[(&str, &[u8])]) -> Self {
            Self {
                blobs: blobs
                    .iter()
                    .map(|(uri, bytes)| (uri.to_string(), bytes.to_vec()))
                    .collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for MemoryFetcher {
        async fn fetch(&self, remote: &RemoteArtifact, dest: &Path) -> ArtcacheResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let bytes = self
                .blobs
                .get(&remote.uri)
                .ok_or_else(|| ArtcacheError::fetch(&remote.uri, "404"))?;
            tokio::fs::write(dest, bytes)
                .await
                .map_err(|e| ArtcacheError::io("writing fetched blob", e))
        }

        fn fetcher_name(&self) -> &'static str {
            "memory"
        }
    }

    #[tokio::test]
    async fn materializes_remote_only() {
        let scratch = TempDir::new().unwrap();
        let fetcher = Arc::new(MemoryFetcher::with(&[("mem://a", b"aaa")]));
        let executor = Executor::new(2, CancelToken::new());
        let remote = Artifact::remote_output("out/a.jar", "mem://a");
        let local = Artifact::source_file("lib/b.jar");

        let (inputs, failed) = materialize(
            fetcher.clone(),
            &executor,
            vec![remote.clone(), local.clone(), remote.clone()],
            scratch.path(),
        )
        .await
        .unwrap();

        assert!(failed.is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(std::fs::read(inputs.resolve(&remote).unwrap()).unwrap(), b"aaa");
        assert_eq!(inputs.resolve(&local).unwrap(), PathBuf::from("lib/b.jar"));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_artifact_unresolved() {
        let scratch = TempDir::new().unwrap();
        let fetcher = Arc::new(MemoryFetcher::default());
        let executor = Executor::new(2, CancelToken::new());
        let remote = Artifact::remote_output("out/a.jar", "mem://missing");

        let (inputs, failed) = materialize(fetcher, &executor, vec![remote.clone()], scratch.path())
            .await
            .unwrap();

        assert_eq!(failed.len(), 1);
        assert!(matches!(
            inputs.resolve(&remote),
            Err(ArtcacheError::NotMaterialized(_))
        ));
    }

    #[tokio::test]
    async fn file_uris_are_copied() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("remote.jar");
        std::fs::write(&src, b"bytes").unwrap();
        let dest = temp.path().join("fetched");

        let fetcher = SchemeFetcher::new(Duration::from_secs(5));
        let remote = RemoteArtifact {
            uri: format!("file://{}", src.display()),
        };
        fetcher.fetch(&remote, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn unknown_scheme_is_rejected() {
        let temp = TempDir::new().unwrap();
        let fetcher = SchemeFetcher::new(Duration::from_secs(5));
        let remote = RemoteArtifact {
            uri: "gs://bucket/a.jar".to_string(),
        };
        let err = fetcher.fetch(&remote, &temp.path().join("x")).await.unwrap_err();
        assert!(matches!(err, ArtcacheError::Fetch { .. }));
    }
}
