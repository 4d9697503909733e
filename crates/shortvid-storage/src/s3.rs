use crate::traits::{validate_key, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload,
    Result as ObjectResult,
};
use std::path::Path;

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, Debug)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Endpoint host, e.g. `s3.example.com` or `localhost:9000`. A value that
    /// already carries a scheme is used as-is.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub use_ssl: bool,
    /// Use path-style requests (`{endpoint}/{bucket}/{key}`), needed by MinIO.
    pub hostname_immutable: bool,
}

impl S3Settings {
    fn endpoint_url(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?.trim_end_matches('/');
        if endpoint.contains("://") {
            return Some(endpoint.to_string());
        }
        let scheme = if self.use_ssl { "https" } else { "http" };
        if self.hostname_immutable {
            Some(format!("{}://{}", scheme, endpoint))
        } else {
            // Virtual-hosted requests need the bucket in the endpoint host.
            Some(format!("{}://{}.{}", scheme, self.bucket, endpoint))
        }
    }
}

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Credentials not given explicitly are taken from the standard AWS
    /// environment variables.
    pub fn new(settings: S3Settings) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(settings.region.clone())
            .with_bucket_name(settings.bucket.clone());

        if let (Some(key_id), Some(secret)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            builder = builder
                .with_access_key_id(key_id.clone())
                .with_secret_access_key(secret.clone());
        }

        if let Some(endpoint) = settings.endpoint_url() {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(!settings.use_ssl)
                .with_virtual_hosted_style_request(!settings.hostname_immutable);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket: settings.bucket,
        })
    }
}

/// Sort object_store failures into the retryable / non-retryable split the
/// pipeline relies on.
fn map_object_store_error(err: ObjectStoreError, key: &str) -> StorageError {
    match err {
        ObjectStoreError::InvalidPath { .. } => StorageError::InvalidKey(key.to_string()),
        ObjectStoreError::NotFound { path, .. } => StorageError::NotFound(path),
        ObjectStoreError::PermissionDenied { .. }
        | ObjectStoreError::Unauthenticated { .. }
        | ObjectStoreError::Generic { .. } => StorageError::Unavailable(err.to_string()),
        other => StorageError::UploadFailed(other.to_string()),
    }
}

/// Upload options that make the object servable with the right `Content-Type`.
fn put_options(content_type: &str) -> PutOptions {
    PutOptions {
        attributes: Attributes::from_iter([(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        )]),
        ..Default::default()
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put_file(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        validate_key(key)?;
        let data = tokio::fs::read(local_path).await?;
        let size = data.len() as u64;
        let location = ObjectPath::from(key);

        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put_opts(
                &location,
                PutPayload::from(Bytes::from(data)),
                put_options(content_type),
            )
            .await
            .map(|_| ());

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            map_object_store_error(e, key)
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            content_type = %content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        let location = ObjectPath::from(key);
        let start = std::time::Instant::now();

        match self.store.delete(&location).await {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "S3 delete failed"
                );
                return Err(match map_object_store_error(e, key) {
                    StorageError::UploadFailed(msg) => StorageError::DeleteFailed(msg),
                    mapped => mapped,
                });
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> S3Settings {
        S3Settings {
            bucket: "b".to_string(),
            region: "us-east-1".to_string(),
            endpoint: Some("e.com".to_string()),
            access_key_id: Some("key".to_string()),
            secret_access_key: Some("secret".to_string()),
            use_ssl: true,
            hostname_immutable: false,
        }
    }

    #[test]
    fn endpoint_url_is_virtual_hosted_by_default() {
        assert_eq!(settings().endpoint_url().unwrap(), "https://b.e.com");
    }

    #[test]
    fn endpoint_url_path_style_without_ssl() {
        let settings = S3Settings {
            endpoint: Some("localhost:9000".to_string()),
            use_ssl: false,
            hostname_immutable: true,
            ..settings()
        };
        assert_eq!(settings.endpoint_url().unwrap(), "http://localhost:9000");
    }

    #[test]
    fn endpoint_with_scheme_is_kept() {
        let settings = S3Settings {
            endpoint: Some("http://minio:9000/".to_string()),
            ..settings()
        };
        assert_eq!(settings.endpoint_url().unwrap(), "http://minio:9000");
    }

    #[test]
    fn builds_without_network() {
        let storage = S3Storage::new(settings()).unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::S3);
    }

    #[test]
    fn connectivity_and_auth_errors_are_retryable() {
        let generic = ObjectStoreError::Generic {
            store: "S3",
            source: "connection reset".into(),
        };
        assert!(map_object_store_error(generic, "42/clip.mp4").is_retryable());

        let denied = ObjectStoreError::PermissionDenied {
            path: "42/clip.mp4".to_string(),
            source: "403".into(),
        };
        assert!(map_object_store_error(denied, "42/clip.mp4").is_retryable());
    }

    #[test]
    fn missing_bucket_is_not_retryable() {
        let missing = ObjectStoreError::NotFound {
            path: "42/clip.mp4".to_string(),
            source: "NoSuchBucket".into(),
        };
        let mapped = map_object_store_error(missing, "42/clip.mp4");
        assert!(matches!(mapped, StorageError::NotFound(_)));
        assert!(!mapped.is_retryable());
    }

    #[test]
    fn uploads_set_content_type() {
        let opts = put_options("video/mp4");
        let value = opts.attributes.get(&Attribute::ContentType).unwrap();
        assert_eq!(AsRef::<str>::as_ref(value), "video/mp4");
    }

    #[tokio::test]
    async fn put_file_rejects_bad_key_before_reading() {
        let storage = S3Storage::new(settings()).unwrap();
        let err = storage
            .put_file(Path::new("/does/not/exist"), "../clip.mp4", "video/mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }
}
