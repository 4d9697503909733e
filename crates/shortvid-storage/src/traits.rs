//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connectivity or credential failure; the same request may succeed later.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    /// The bucket (or local root) does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// Whether retrying the same operation can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait
///
/// Implementations must be safe for concurrent use: every publish run writes
/// distinct keys, so no locking across runs is needed.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload the file at `local_path` under `key`.
    ///
    /// On success the object exists at `key` in the configured bucket. The
    /// public URL is built by the caller.
    async fn put_file(&self, local_path: &Path, key: &str, content_type: &str)
        -> StorageResult<()>;

    /// Delete the object at `key`. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}

/// Reject keys that could escape the author's prefix.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..")
        || key.chars().any(|c| c.is_control())
    {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(StorageError::Unavailable("timeout".into()).is_retryable());
        assert!(!StorageError::InvalidKey("..".into()).is_retryable());
        assert!(!StorageError::NotFound("bucket".into()).is_retryable());
        assert!(!StorageError::UploadFailed("400".into()).is_retryable());
    }

    #[test]
    fn validate_key_rules() {
        assert!(validate_key("42/clip.mp4").is_ok());
        assert!(validate_key("42/clip.mp4-cover.jpeg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/42/clip.mp4").is_err());
        assert!(validate_key("42/../etc/passwd").is_err());
        assert!(validate_key("42//clip.mp4").is_err());
        assert!(validate_key("42/clip\n.mp4").is_err());
    }
}
