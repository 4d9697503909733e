use crate::traits::{validate_key, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, creating it if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    /// Plain files carry no object metadata, so the content type is not kept;
    /// whatever serves the directory derives it from the extension.
    async fn put_file(
        &self,
        local_path: &Path,
        key: &str,
        _content_type: &str,
    ) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let start = std::time::Instant::now();

        let size = fs::copy(local_path, &path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to copy to {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(key = %key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_and_delete_roundtrip() {
        let root = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        let staged = source.path().join("clip.mp4");
        fs::write(&staged, b"video bytes").await.unwrap();

        let storage = LocalStorage::new(root.path()).await.unwrap();
        storage
            .put_file(&staged, "42/clip.mp4", "video/mp4")
            .await
            .unwrap();

        let stored = root.path().join("42/clip.mp4");
        assert_eq!(fs::read(&stored).await.unwrap(), b"video bytes");

        storage.delete("42/clip.mp4").await.unwrap();
        assert!(!stored.exists());
        // Deleting twice is fine.
        storage.delete("42/clip.mp4").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_traversal_keys() {
        let root = TempDir::new().unwrap();
        let storage = LocalStorage::new(root.path()).await.unwrap();
        let err = storage
            .put_file(Path::new("/irrelevant"), "42/../../escape", "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn missing_source_is_upload_failure() {
        let root = TempDir::new().unwrap();
        let storage = LocalStorage::new(root.path()).await.unwrap();
        let err = storage
            .put_file(&root.path().join("nope.mp4"), "42/nope.mp4", "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
        assert!(!err.is_retryable());
    }
}
