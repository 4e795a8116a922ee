use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::config::{ConfigBundle, PathsSection};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid job id {0:?}: expected 1-128 characters from [A-Za-z0-9_.-]")]
    InvalidJobId(String),
    #[error("io error at {path}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

fn job_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.-]{1,128}$").expect("valid regex"))
}

/// Caller-supplied job identifier, safe to splice into a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn parse(raw: &str) -> StorageResult<Self> {
        if raw == "." || raw == ".." || !job_id_pattern().is_match(raw) {
            return Err(StorageError::InvalidJobId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Raw remux waiting for compression.
    Staging,
    /// Result of `/process`.
    Output,
    /// Result of `/tiktok`.
    Composed,
}

/// Maps job ids to artifact paths under the configured directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    downloads_dir: PathBuf,
    staging_dir: PathBuf,
    composed_dir: PathBuf,
    label: String,
}

impl ArtifactStore {
    pub fn new(
        downloads_dir: impl Into<PathBuf>,
        staging_dir: impl Into<PathBuf>,
        composed_dir: impl Into<PathBuf>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
            staging_dir: staging_dir.into(),
            composed_dir: composed_dir.into(),
            label: label.into(),
        }
    }

    pub fn from_config(paths: &PathsSection, base: &Path) -> Self {
        Self::new(
            ConfigBundle::resolve_path(base, &paths.downloads_dir),
            ConfigBundle::resolve_path(base, &paths.staging_dir),
            ConfigBundle::resolve_path(base, &paths.composed_dir),
            paths.artifact_label.clone(),
        )
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    pub fn composed_dir(&self) -> &Path {
        &self.composed_dir
    }

    pub fn file_name(&self, kind: ArtifactKind, id: &JobId) -> String {
        match kind {
            ArtifactKind::Staging => format!("temp_{id}_{}.mp4", self.label),
            ArtifactKind::Output => format!("{id}_{}.mp4", self.label),
            ArtifactKind::Composed => format!("tiktok_{id}_{}.mp4", self.label),
        }
    }

    pub fn path(&self, kind: ArtifactKind, id: &JobId) -> PathBuf {
        let dir = match kind {
            ArtifactKind::Staging => &self.staging_dir,
            ArtifactKind::Output => &self.downloads_dir,
            ArtifactKind::Composed => &self.composed_dir,
        };
        dir.join(self.file_name(kind, id))
    }

    pub async fn ensure_dirs(&self) -> StorageResult<()> {
        for dir in [&self.downloads_dir, &self.staging_dir, &self.composed_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|source| StorageError::Io {
                    source,
                    path: dir.clone(),
                })?;
        }
        Ok(())
    }

    /// Path of the artifact if it is present as a regular file.
    pub async fn existing(&self, kind: ArtifactKind, id: &JobId) -> StorageResult<Option<PathBuf>> {
        let path = self.path(kind, id);
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "artifact not present");
                Ok(None)
            }
            Err(source) => Err(StorageError::Io { source, path }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ArtifactStore {
        ArtifactStore::new("downloads", "staging", "tiktok", "futebol")
    }

    #[test]
    fn accepts_plain_ids() {
        for id in ["job1", "2024-05-01_final", "a.b", "X"] {
            assert!(JobId::parse(id).is_ok(), "{id} should be accepted");
        }
    }

    #[test]
    fn rejects_path_like_ids() {
        let long = "a".repeat(129);
        for id in ["", ".", "..", "../etc", "a/b", "a\\b", "sp ace", long.as_str()] {
            assert!(
                matches!(JobId::parse(id), Err(StorageError::InvalidJobId(_))),
                "{id:?} should be rejected"
            );
        }
    }

    #[test]
    fn artifact_names_follow_stage() {
        let store = store();
        let id = JobId::parse("job1").unwrap();
        assert_eq!(
            store.path(ArtifactKind::Staging, &id),
            PathBuf::from("staging/temp_job1_futebol.mp4")
        );
        assert_eq!(
            store.path(ArtifactKind::Output, &id),
            PathBuf::from("downloads/job1_futebol.mp4")
        );
        assert_eq!(
            store.path(ArtifactKind::Composed, &id),
            PathBuf::from("tiktok/tiktok_job1_futebol.mp4")
        );
    }

    #[tokio::test]
    async fn existing_reports_only_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(
            dir.path().join("downloads"),
            dir.path().join("staging"),
            dir.path().join("tiktok"),
            "futebol",
        );
        store.ensure_dirs().await.unwrap();
        let id = JobId::parse("job1").unwrap();
        assert!(store.existing(ArtifactKind::Output, &id).await.unwrap().is_none());

        std::fs::write(store.path(ArtifactKind::Output, &id), b"data").unwrap();
        assert_eq!(
            store.existing(ArtifactKind::Output, &id).await.unwrap(),
            Some(store.path(ArtifactKind::Output, &id))
        );
    }
}
