//! Common types for the publisher

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::release::ReleaseNote;
use crate::traits::ArtifactSource;

/// Default per-request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Publisher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayConfig {
    /// Package name (e.g., "com.example.app")
    pub package_name: String,

    /// Per-request timeout in seconds; the overall transaction is
    /// unbounded because upload duration depends on payload size
    pub timeout_secs: u64,
}

impl PlayConfig {
    /// Create a configuration with the default request timeout.
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Artifact kind, which selects the upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// APK package
    Apk,
    /// Android App Bundle
    Bundle,
}

impl ArtifactKind {
    /// Derive the kind from a file extension; anything but `.aab` uploads
    /// as an APK.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "aab" => ArtifactKind::Bundle,
            _ => ArtifactKind::Apk,
        }
    }

    /// Upload endpoint segment for this kind.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ArtifactKind::Apk => "apks",
            ArtifactKind::Bundle => "bundles",
        }
    }
}

/// A binary artifact staged into an edit.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Display name, usually the file name
    pub name: String,

    /// Kind, selecting the upload endpoint
    pub kind: ArtifactKind,

    /// Raw artifact bytes
    pub bytes: Vec<u8>,
}

/// Planned release for one target track.
#[derive(Debug, Clone, Default)]
pub struct ReleasePlan {
    /// Target track (e.g., "internal", "beta", "production")
    pub track: String,

    /// Fraction of users for a staged rollout (0.0 - 1.0)
    pub rollout_fraction: Option<f64>,

    /// In-app update priority (typically 0-5)
    pub update_priority: Option<i32>,

    /// Localized release notes; sparse entries are passed through
    pub release_notes: Option<Vec<Option<ReleaseNote>>>,
}

/// Artifact source reading files from disk.
pub struct FileArtifactSource {
    paths: Vec<PathBuf>,
}

impl FileArtifactSource {
    /// Create a source over the given artifact paths.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

#[async_trait::async_trait]
impl ArtifactSource for FileArtifactSource {
    async fn artifacts(&self) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::with_capacity(self.paths.len());

        for path in &self.paths {
            let bytes = tokio::fs::read(path).await?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("artifact")
                .to_string();

            artifacts.push(Artifact {
                name,
                kind: ArtifactKind::from_path(path),
                bytes,
            });
        }

        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_artifact_kind_from_path() {
        assert_eq!(
            ArtifactKind::from_path(Path::new("app-release.aab")),
            ArtifactKind::Bundle
        );
        assert_eq!(
            ArtifactKind::from_path(Path::new("app-release.apk")),
            ArtifactKind::Apk
        );
        assert_eq!(
            ArtifactKind::from_path(Path::new("app-release")),
            ArtifactKind::Apk
        );
    }

    #[test]
    fn test_artifact_kind_endpoint() {
        assert_eq!(ArtifactKind::Apk.endpoint(), "apks");
        assert_eq!(ArtifactKind::Bundle.endpoint(), "bundles");
    }

    #[tokio::test]
    async fn test_file_artifact_source_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.aab");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"bundle bytes").unwrap();

        let source = FileArtifactSource::new(vec![path]);
        let artifacts = source.artifacts().await.unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "app.aab");
        assert_eq!(artifacts[0].kind, ArtifactKind::Bundle);
        assert_eq!(artifacts[0].bytes, b"bundle bytes");
    }

    #[tokio::test]
    async fn test_file_artifact_source_missing_file() {
        let source = FileArtifactSource::new(vec![PathBuf::from("/nonexistent/app.apk")]);

        assert!(source.artifacts().await.is_err());
    }
}
