//! Artifact manifest consumed by the CLI
//!
//! The build tooling writes one TOML file describing every artifact the
//! caches should hold:
//!
//! ```toml
//! previous_remote = ["bin/java/libnet.jar"]
//!
//! [[jar]]
//! path = "bin/java/libfoo.jar"
//! source_jars = [{ path = "bin/java/libfoo-src.jar" }]
//!
//! [[jar]]
//! identity = "bin/java/libnet.jar"
//! url = "https://cas.example.com/blobs/ab12"
//!
//! [[aar]]
//! aar = { path = "bin/android/ui.aar" }
//! jar = { path = "bin/android/ui_merged.jar" }
//! package = "com.example.ui"
//! ```
//!
//! Relative paths resolve against the manifest's directory. Identities
//! default to the path (or URL) as written.

use crate::artifact::Artifact;
use crate::error::{ArtcacheError, ArtcacheResult};
use crate::sync::{AarLibrary, JarLibrary};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// One artifact reference, local or remote
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Stable identity; defaults to `path` or `url` as written
    pub identity: Option<String>,
    /// Local file
    pub path: Option<PathBuf>,
    /// Remote location
    pub url: Option<String>,
}

impl ArtifactRef {
    fn resolve(&self, base: &Path) -> Result<Artifact, String> {
        match (&self.path, &self.url) {
            (Some(path), None) => {
                let identity = self
                    .identity
                    .clone()
                    .unwrap_or_else(|| path.to_string_lossy().into_owned());
                Ok(Artifact::local_output(identity, base.join(path)))
            }
            (None, Some(url)) => {
                let identity = self.identity.clone().unwrap_or_else(|| url.clone());
                Ok(Artifact::remote_output(identity, url.clone()))
            }
            (Some(_), Some(_)) => Err(format!("{}: set either path or url, not both", self.describe())),
            (None, None) => Err(format!("{}: one of path or url is required", self.describe())),
        }
    }

    fn describe(&self) -> String {
        self.identity
            .clone()
            .unwrap_or_else(|| "artifact".to_string())
    }
}

/// A `[[jar]]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JarEntry {
    #[serde(flatten)]
    pub jar: ArtifactRef,
    #[serde(default)]
    pub source_jars: Vec<ArtifactRef>,
}

/// An `[[aar]]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AarEntry {
    pub aar: ArtifactRef,
    pub jar: Option<ArtifactRef>,
    pub package: Option<String>,
}

/// Parsed artifact manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactManifest {
    /// Identities that were remote on the previous sync
    pub previous_remote: BTreeSet<String>,
    #[serde(rename = "jar")]
    pub jars: Vec<JarEntry>,
    #[serde(rename = "aar")]
    pub aars: Vec<AarEntry>,
    /// Directory relative paths resolve against
    #[serde(skip)]
    base_dir: PathBuf,
}

impl ArtifactManifest {
    /// Read and validate a manifest file
    pub async fn load(path: &Path) -> ArtcacheResult<Self> {
        if !path.exists() {
            return Err(ArtcacheError::PathNotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ArtcacheError::io(format!("reading manifest {}", path.display()), e))?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let manifest = Self::parse(&content, base_dir).map_err(|reason| ArtcacheError::ManifestInvalid {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!(
            "Loaded manifest {}: {} jar(s), {} aar(s)",
            path.display(),
            manifest.jars.len(),
            manifest.aars.len()
        );
        Ok(manifest)
    }

    /// Parse manifest text, resolving relative paths against `base_dir`
    pub fn parse(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self, String> {
        let mut manifest: Self = toml::from_str(content).map_err(|e| e.to_string())?;
        manifest.base_dir = base_dir.into();
        // Validate references up front
        manifest.jar_libraries()?;
        manifest.aar_libraries()?;
        Ok(manifest)
    }

    /// Jar libraries in declaration order
    pub fn jar_libraries(&self) -> Result<Vec<JarLibrary>, String> {
        self.jars
            .iter()
            .map(|entry| {
                let mut library = JarLibrary::new(entry.jar.resolve(&self.base_dir)?);
                for source in &entry.source_jars {
                    library = library.with_source_jar(source.resolve(&self.base_dir)?);
                }
                Ok(library)
            })
            .collect()
    }

    /// Android archive libraries in declaration order
    pub fn aar_libraries(&self) -> Result<Vec<AarLibrary>, String> {
        self.aars
            .iter()
            .map(|entry| {
                let mut library = AarLibrary::new(entry.aar.resolve(&self.base_dir)?);
                if let Some(ref jar) = entry.jar {
                    library = library.with_jar(jar.resolve(&self.base_dir)?);
                }
                if let Some(ref package) = entry.package {
                    library = library.with_package(package.clone());
                }
                Ok(library)
            })
            .collect()
    }
}
