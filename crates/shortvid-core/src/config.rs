//! Configuration module
//!
//! Settings for the HTTP server, database, object storage and the publish
//! pipeline. Everything is read from the environment (optionally seeded from a
//! `.env` file) once at startup and then passed around explicitly.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::storage_types::StorageBackend;

// Common constants
const SERVER_PORT: u16 = 8080;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const JWT_EXPIRY_HOURS: i64 = 24;

/// Server, database and auth settings.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub log_format: String,
}

/// Storage and publish pipeline settings.
#[derive(Clone, Debug)]
pub struct PublisherConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_endpoint: Option<String>, // host only, e.g. "s3.example.com"; public URLs are https://{bucket}.{endpoint}/{key}
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_use_ssl: bool,
    pub s3_hostname_immutable: bool, // MinIO: path-style requests
    pub local_storage_path: Option<String>,
    // Publish pipeline
    pub staging_dir: PathBuf,
    pub ffmpeg_path: String,
    pub cover_offset_seconds: f64,
    pub extract_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub commit_timeout_secs: u64,
    pub publish_max_retries: u32,
    pub publish_retry_backoff_ms: u64,
    pub publish_delete_orphans: bool,
    pub max_video_size_bytes: usize,
    pub video_allowed_extensions: Vec<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PublisherConfig>);

impl Config {
    fn inner(&self) -> &PublisherConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = PublisherConfig::from_source(|key| env::var(key).ok())?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn database_url(&self) -> &str {
        &self.inner().base.database_url
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().base.jwt_secret
    }

    pub fn jwt_expiry_hours(&self) -> i64 {
        self.inner().base.jwt_expiry_hours
    }

    pub fn log_format(&self) -> &str {
        &self.inner().base.log_format
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn s3_region(&self) -> &str {
        &self.inner().s3_region
    }

    pub fn s3_access_key_id(&self) -> Option<&str> {
        self.inner().s3_access_key_id.as_deref()
    }

    pub fn s3_secret_access_key(&self) -> Option<&str> {
        self.inner().s3_secret_access_key.as_deref()
    }

    pub fn s3_use_ssl(&self) -> bool {
        self.inner().s3_use_ssl
    }

    pub fn s3_hostname_immutable(&self) -> bool {
        self.inner().s3_hostname_immutable
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn staging_dir(&self) -> &PathBuf {
        &self.inner().staging_dir
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.inner().ffmpeg_path
    }

    pub fn cover_offset_seconds(&self) -> f64 {
        self.inner().cover_offset_seconds
    }

    pub fn extract_timeout_secs(&self) -> u64 {
        self.inner().extract_timeout_secs
    }

    pub fn upload_timeout_secs(&self) -> u64 {
        self.inner().upload_timeout_secs
    }

    pub fn commit_timeout_secs(&self) -> u64 {
        self.inner().commit_timeout_secs
    }

    pub fn publish_max_retries(&self) -> u32 {
        self.inner().publish_max_retries
    }

    pub fn publish_retry_backoff_ms(&self) -> u64 {
        self.inner().publish_retry_backoff_ms
    }

    pub fn publish_delete_orphans(&self) -> bool {
        self.inner().publish_delete_orphans
    }

    pub fn max_video_size_bytes(&self) -> usize {
        self.inner().max_video_size_bytes
    }

    pub fn video_allowed_extensions(&self) -> &[String] {
        &self.inner().video_allowed_extensions
    }
}

/// Parse `key` from the source, falling back to `default` when unset or malformed.
fn parsed_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl PublisherConfig {
    /// Build the configuration from a key lookup (the process environment in production).
    pub fn from_source(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        const COVER_OFFSET_SECONDS: f64 = 10.0;
        const EXTRACT_TIMEOUT_SECS: u64 = 60;
        const UPLOAD_TIMEOUT_SECS: u64 = 120;
        const COMMIT_TIMEOUT_SECS: u64 = 10;
        const PUBLISH_MAX_RETRIES: u32 = 2;
        const PUBLISH_RETRY_BACKOFF_MS: u64 = 200;
        const MAX_VIDEO_SIZE_MB: usize = 500;

        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let server_port = match lookup("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            None => SERVER_PORT,
        };

        let base = BaseConfig {
            server_port,
            environment,
            database_url: lookup("DATABASE_URL")
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?,
            db_max_connections: parsed_or(&lookup, "DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parsed_or(&lookup, "DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            jwt_secret: lookup("JWT_SECRET")
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            jwt_expiry_hours: parsed_or(&lookup, "JWT_EXPIRY_HOURS", JWT_EXPIRY_HOURS),
            log_format: lookup("LOG_FORMAT").unwrap_or_else(|| "text".to_string()),
        };

        let storage_backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse()?,
            None => StorageBackend::S3,
        };

        let staging_dir = lookup("STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("shortvid-staging"));

        let max_video_size_mb = parsed_or(&lookup, "MAX_VIDEO_SIZE_MB", MAX_VIDEO_SIZE_MB);

        let video_allowed_extensions = lookup("VIDEO_ALLOWED_EXTENSIONS")
            .unwrap_or_else(|| "mp4,mov,webm,mkv,avi,m4v".to_string())
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            base,
            storage_backend,
            s3_bucket: non_empty(lookup("S3_BUCKET")),
            s3_endpoint: non_empty(lookup("S3_ENDPOINT")),
            s3_region: lookup("S3_REGION")
                .or_else(|| lookup("AWS_REGION"))
                .unwrap_or_else(|| "us-east-1".to_string()),
            s3_access_key_id: non_empty(lookup("S3_ACCESS_KEY_ID")),
            s3_secret_access_key: non_empty(lookup("S3_SECRET_ACCESS_KEY")),
            s3_use_ssl: parsed_or(&lookup, "S3_USE_SSL", true),
            s3_hostname_immutable: parsed_or(&lookup, "S3_HOSTNAME_IMMUTABLE", false),
            local_storage_path: non_empty(lookup("LOCAL_STORAGE_PATH")),
            staging_dir,
            ffmpeg_path: lookup("FFMPEG_PATH").unwrap_or_else(|| "ffmpeg".to_string()),
            cover_offset_seconds: parsed_or(&lookup, "COVER_OFFSET_SECONDS", COVER_OFFSET_SECONDS),
            extract_timeout_secs: parsed_or(&lookup, "EXTRACT_TIMEOUT_SECONDS", EXTRACT_TIMEOUT_SECS),
            upload_timeout_secs: parsed_or(&lookup, "UPLOAD_TIMEOUT_SECONDS", UPLOAD_TIMEOUT_SECS),
            commit_timeout_secs: parsed_or(&lookup, "COMMIT_TIMEOUT_SECONDS", COMMIT_TIMEOUT_SECS),
            publish_max_retries: parsed_or(&lookup, "PUBLISH_MAX_RETRIES", PUBLISH_MAX_RETRIES),
            publish_retry_backoff_ms: parsed_or(
                &lookup,
                "PUBLISH_RETRY_BACKOFF_MS",
                PUBLISH_RETRY_BACKOFF_MS,
            ),
            publish_delete_orphans: parsed_or(&lookup, "PUBLISH_DELETE_ORPHANS", false),
            max_video_size_bytes: max_video_size_mb * 1024 * 1024,
            video_allowed_extensions,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.trim().is_empty() {
            return Err(anyhow::anyhow!("JWT_SECRET must not be empty"));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_endpoint.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_ENDPOINT must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
        }

        if self.extract_timeout_secs == 0
            || self.upload_timeout_secs == 0
            || self.commit_timeout_secs == 0
        {
            return Err(anyhow::anyhow!("Publish timeouts must be greater than zero"));
        }

        if !(self.cover_offset_seconds >= 0.0 && self.cover_offset_seconds.is_finite()) {
            return Err(anyhow::anyhow!(
                "COVER_OFFSET_SECONDS must be a non-negative number"
            ));
        }

        if self.video_allowed_extensions.is_empty() {
            return Err(anyhow::anyhow!("VIDEO_ALLOWED_EXTENSIONS must not be empty"));
        }

        Ok(())
    }
}
