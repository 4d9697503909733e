//! Local staging for publish runs
//!
//! Each run gets its own directory `{root}/{author_id}/{run_id}`. Every file a
//! run writes lives there, so releasing the run removes them all at once.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncWriteExt, BufWriter};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("Failed to create staging directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write staged file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid staged file name: {0}")]
    InvalidFileName(String),
}

/// Root of all staging areas.
#[derive(Clone, Debug)]
pub struct StagingStore {
    root: PathBuf,
}

impl StagingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh, empty staging area for one run of `author_id`.
    pub async fn open(&self, author_id: i64) -> Result<StagingArea, StagingError> {
        let run_id = Uuid::new_v4();
        let dir = self
            .root
            .join(author_id.to_string())
            .join(run_id.to_string());

        fs::create_dir_all(&dir)
            .await
            .map_err(|source| StagingError::CreateDir {
                path: dir.clone(),
                source,
            })?;

        Ok(StagingArea {
            dir,
            run_id,
            released: false,
        })
    }
}

/// A run-scoped staging directory.
///
/// Call [`StagingArea::release`] on every terminal path. If the area is dropped
/// without being released (the run future was cancelled), the directory is
/// removed synchronously in `Drop`.
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
    run_id: Uuid,
    released: bool,
}

impl StagingArea {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Resolve `file_name` inside the area. Only a single normal path
    /// component is accepted.
    pub fn file_path(&self, file_name: &str) -> Result<PathBuf, StagingError> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.dir.join(file_name)),
            _ => Err(StagingError::InvalidFileName(file_name.to_string())),
        }
    }

    /// Drain `reader` into `file_name`, returning the staged path and its size.
    pub async fn stage<R>(&self, file_name: &str, reader: R) -> Result<(PathBuf, u64), StagingError>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.file_path(file_name)?;
        let mut reader = reader;

        let written = async {
            let mut file = BufWriter::new(File::create(&path).await?);
            let written = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok::<_, io::Error>(written)
        }
        .await
        .map_err(|source| StagingError::Write {
            path: path.clone(),
            source,
        })?;

        Ok((path, written))
    }

    /// Write an in-memory buffer to `file_name`.
    pub async fn write(&self, file_name: &str, data: &[u8]) -> Result<PathBuf, StagingError> {
        let path = self.file_path(file_name)?;
        fs::write(&path, data)
            .await
            .map_err(|source| StagingError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }

    /// Remove the area and everything in it.
    ///
    /// A missing directory is not an error. Other failures are logged and
    /// swallowed so they never replace the run's own result.
    pub async fn release(mut self) {
        self.released = true;
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => {
                tracing::debug!(
                    run_id = %self.run_id,
                    path = %self.dir.display(),
                    "Staging area released"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    run_id = %self.run_id,
                    path = %self.dir.display(),
                    "Failed to release staging area"
                );
            }
        }
        self.remove_empty_parent();
    }

    // The per-author directory is shared by concurrent runs; removing it only
    // succeeds once it is empty.
    fn remove_empty_parent(&self) {
        if let Some(parent) = self.dir.parent() {
            let _ = std::fs::remove_dir(parent);
        }
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.dir) {
            Ok(()) => {
                tracing::debug!(
                    run_id = %self.run_id,
                    "Staging area removed after cancelled run"
                );
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    run_id = %self.run_id,
                    path = %self.dir.display(),
                    "Failed to remove staging area after cancelled run"
                );
            }
        }
        self.remove_empty_parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn open_creates_run_scoped_directory() {
        let root = TempDir::new().unwrap();
        let store = StagingStore::new(root.path());

        let first = store.open(42).await.unwrap();
        let second = store.open(42).await.unwrap();

        assert!(first.path().starts_with(root.path().join("42")));
        assert_ne!(first.path(), second.path());
        assert!(first.path().is_dir());
        assert!(second.path().is_dir());
    }

    #[tokio::test]
    async fn stage_drains_reader() {
        let root = TempDir::new().unwrap();
        let area = StagingStore::new(root.path()).open(42).await.unwrap();

        let content: &[u8] = b"0123456789";
        let (path, size) = area.stage("clip.mp4", content).await.unwrap();

        assert_eq!(size, 10);
        assert_eq!(fs::read(&path).await.unwrap(), b"0123456789");
        assert_eq!(path, area.path().join("clip.mp4"));
    }

    #[tokio::test]
    async fn rejects_nested_or_parent_file_names() {
        let root = TempDir::new().unwrap();
        let area = StagingStore::new(root.path()).open(42).await.unwrap();

        assert!(area.file_path("../clip.mp4").is_err());
        assert!(area.file_path("a/clip.mp4").is_err());
        assert!(area.file_path("/clip.mp4").is_err());
        assert!(area.file_path("").is_err());
        assert!(area.file_path("clip.mp4").is_ok());
    }

    #[tokio::test]
    async fn release_removes_everything() {
        let root = TempDir::new().unwrap();
        let area = StagingStore::new(root.path()).open(42).await.unwrap();
        area.write("clip.mp4", b"video").await.unwrap();
        area.write("clip.mp4-cover.jpeg", b"cover").await.unwrap();
        let dir = area.path().to_path_buf();

        area.release().await;

        assert!(!dir.exists());
        assert!(!root.path().join("42").exists());
    }

    #[tokio::test]
    async fn release_tolerates_missing_directory() {
        let root = TempDir::new().unwrap();
        let area = StagingStore::new(root.path()).open(42).await.unwrap();
        std::fs::remove_dir_all(area.path()).unwrap();

        area.release().await;
    }

    #[tokio::test]
    async fn drop_without_release_removes_directory() {
        let root = TempDir::new().unwrap();
        let area = StagingStore::new(root.path()).open(7).await.unwrap();
        area.write("clip.mp4", b"video").await.unwrap();
        let dir = area.path().to_path_buf();

        drop(area);

        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn release_keeps_sibling_runs() {
        let root = TempDir::new().unwrap();
        let store = StagingStore::new(root.path());
        let first = store.open(42).await.unwrap();
        let second = store.open(42).await.unwrap();
        second.write("clip.mp4", b"other run").await.unwrap();

        first.release().await;

        assert!(second.path().join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn failing_reader_is_write_error() {
        struct Broken;
        impl AsyncRead for Broken {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<io::Result<()>> {
                std::task::Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::ConnectionReset,
                    "client went away",
                )))
            }
        }

        let root = TempDir::new().unwrap();
        let area = StagingStore::new(root.path()).open(42).await.unwrap();
        let err = area.stage("clip.mp4", Broken).await.unwrap_err();
        assert!(matches!(err, StagingError::Write { .. }));
    }
}
