use std::time::Duration;

use shortvid_core::Config;

use super::retry::RetryPolicy;

/// Pipeline settings, injected at construction.
#[derive(Clone, Debug)]
pub struct PublishConfig {
    /// Bucket and endpoint used to build public URLs.
    pub bucket: String,
    pub endpoint: String,
    pub cover_offset_seconds: f64,
    pub extract_timeout: Duration,
    pub upload_timeout: Duration,
    pub commit_timeout: Duration,
    pub retry: RetryPolicy,
    /// Delete already-uploaded objects when a later step fails.
    pub delete_orphans: bool,
    /// Lower-case extensions without the dot.
    pub allowed_extensions: Vec<String>,
}

impl PublishConfig {
    pub fn new(bucket: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            endpoint: endpoint.into(),
            cover_offset_seconds: 10.0,
            extract_timeout: Duration::from_secs(60),
            upload_timeout: Duration::from_secs(120),
            commit_timeout: Duration::from_secs(10),
            retry: RetryPolicy::new(2, Duration::from_millis(200)),
            delete_orphans: false,
            allowed_extensions: ["mp4", "mov", "webm", "mkv", "avi", "m4v"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        // The local backend has no bucket; URLs still follow the same shape.
        let bucket = config.s3_bucket().unwrap_or("shortvid");
        let endpoint = config.s3_endpoint().unwrap_or("localhost");

        Self {
            cover_offset_seconds: config.cover_offset_seconds(),
            extract_timeout: Duration::from_secs(config.extract_timeout_secs()),
            upload_timeout: Duration::from_secs(config.upload_timeout_secs()),
            commit_timeout: Duration::from_secs(config.commit_timeout_secs()),
            retry: RetryPolicy::new(
                config.publish_max_retries(),
                Duration::from_millis(config.publish_retry_backoff_ms()),
            ),
            delete_orphans: config.publish_delete_orphans(),
            allowed_extensions: config.video_allowed_extensions().to_vec(),
            ..Self::new(bucket, endpoint)
        }
    }
}
