use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use shortvid_core::models::{NewVideo, Video};
use shortvid_core::{ErrorMetadata, LogLevel};
use shortvid_storage::Storage;
use tokio::io::AsyncRead;
use tokio::time::timeout;
use uuid::Uuid;

use super::config::PublishConfig;
use super::errors::{PublishError, PublishStep};
use super::store::VideoStore;
use super::urls::{cover_file_name, cover_key, public_object_url, video_key};
use crate::encoder::CoverEncoder;
use crate::extractor::FrameExtractor;
use crate::staging::{StagingArea, StagingStore};

const MAX_FILE_NAME_LEN: usize = 255;

/// One inbound upload.
pub struct UploadRequest<R> {
    pub author_id: i64,
    /// File name as declared by the client.
    pub file_name: String,
    pub title: Option<String>,
    pub content: R,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Received,
    Staged,
    Thumbnailed,
    Uploaded,
    Committed,
    Failed,
}

impl Display for PublishState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PublishState::Received => write!(f, "received"),
            PublishState::Staged => write!(f, "staged"),
            PublishState::Thumbnailed => write!(f, "thumbnailed"),
            PublishState::Uploaded => write!(f, "uploaded"),
            PublishState::Committed => write!(f, "committed"),
            PublishState::Failed => write!(f, "failed"),
        }
    }
}

/// Reduce a declared file name to a safe object key segment.
///
/// Only the last path component is kept. Characters outside
/// `[alphanumeric . - _]` become `_`. Names containing `..`, empty names and
/// extensions outside `allowed_extensions` are rejected.
pub fn sanitize_file_name(
    declared: &str,
    allowed_extensions: &[String],
) -> Result<String, PublishError> {
    let base = declared
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(declared)
        .trim();

    if base.is_empty() || base.contains("..") {
        return Err(PublishError::InvalidUpload("invalid file name".to_string()));
    }

    let name: String = base
        .chars()
        .take(MAX_FILE_NAME_LEN)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let extension = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => {
            return Err(PublishError::InvalidUpload(
                "file name has no extension".to_string(),
            ))
        }
    };

    if !allowed_extensions.iter().any(|allowed| *allowed == extension) {
        return Err(PublishError::InvalidUpload(format!(
            "file extension .{} is not allowed",
            extension
        )));
    }

    Ok(name)
}

fn video_content_type(file_name: &str) -> &'static str {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "m4v" => "video/x-m4v",
        _ => "application/octet-stream",
    }
}

/// Sequences staging, extraction, encoding, upload and commit.
///
/// Cheap to clone; every collaborator is shared and safe for concurrent runs.
#[derive(Clone)]
pub struct PublishPipeline {
    staging: StagingStore,
    extractor: Arc<dyn FrameExtractor>,
    encoder: CoverEncoder,
    storage: Arc<dyn Storage>,
    videos: Arc<dyn VideoStore>,
    config: Arc<PublishConfig>,
}

impl PublishPipeline {
    pub fn new(
        staging: StagingStore,
        extractor: Arc<dyn FrameExtractor>,
        storage: Arc<dyn Storage>,
        videos: Arc<dyn VideoStore>,
        config: PublishConfig,
    ) -> Self {
        Self {
            staging,
            extractor,
            encoder: CoverEncoder::default(),
            storage,
            videos,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Validate the declared file name and open a staging area for the run.
    pub async fn begin(&self, author_id: i64, file_name: &str) -> Result<PublishRun, PublishError> {
        let file_name = sanitize_file_name(file_name, &self.config.allowed_extensions)?;
        let area = self.staging.open(author_id).await?;

        tracing::info!(
            author_id,
            run_id = %area.run_id(),
            file_name = %file_name,
            state = %PublishState::Received,
            "Publish run started"
        );

        Ok(PublishRun {
            pipeline: self.clone(),
            area,
            author_id,
            file_name,
        })
    }

    /// Run the whole pipeline for a request whose fields are all known upfront.
    pub async fn publish<R>(&self, request: UploadRequest<R>) -> Result<Video, PublishError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let run = self.begin(request.author_id, &request.file_name).await?;
        let staged = run.stage(request.content).await?;
        staged.publish(request.title).await
    }

    async fn extract_cover(&self, video_path: &Path) -> Result<Vec<u8>, PublishError> {
        let after = self.config.extract_timeout;
        match timeout(
            after,
            self.extractor
                .extract_frame(video_path, self.config.cover_offset_seconds),
        )
        .await
        {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(PublishError::Timeout {
                step: PublishStep::Extract,
                after,
            }),
        }
    }

    async fn upload(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
        step: PublishStep,
    ) -> Result<(), PublishError> {
        let after = self.config.upload_timeout;
        self.config
            .retry
            .run(&step.to_string(), PublishError::is_retryable, move || async move {
                match timeout(after, self.storage.put_file(local_path, key, content_type)).await {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(source)) => Err(PublishError::Storage {
                        key: key.to_string(),
                        source,
                    }),
                    Err(_) => Err(PublishError::Timeout { step, after }),
                }
            })
            .await
    }

    async fn commit(&self, video: &NewVideo) -> Result<Video, PublishError> {
        let after = self.config.commit_timeout;
        self.config
            .retry
            .run("metadata commit", PublishError::is_retryable, move || async move {
                match timeout(after, self.videos.create(video)).await {
                    Ok(Ok(video)) => Ok(video),
                    Ok(Err(e)) => Err(PublishError::Persistence(e)),
                    Err(_) => Err(PublishError::Timeout {
                        step: PublishStep::Commit,
                        after,
                    }),
                }
            })
            .await
    }

    /// Look up the row a run may have written before its commit failed.
    async fn find_committed(&self, run_id: Uuid) -> Result<Option<Video>, PublishError> {
        let after = self.config.commit_timeout;
        self.config
            .retry
            .run("commit lookup", PublishError::is_retryable, move || async move {
                match timeout(after, self.videos.find_by_run_id(run_id)).await {
                    Ok(Ok(video)) => Ok(video),
                    Ok(Err(e)) => Err(PublishError::Persistence(e)),
                    Err(_) => Err(PublishError::Timeout {
                        step: PublishStep::Commit,
                        after,
                    }),
                }
            })
            .await
    }

    /// Best-effort removal of objects no committed video will reference.
    async fn delete_orphans(&self, keys: &[&str]) {
        if !self.config.delete_orphans {
            return;
        }
        for key in keys {
            match self.storage.delete(key).await {
                Ok(()) => tracing::info!(key = %key, "Deleted orphaned object"),
                Err(e) => tracing::warn!(error = %e, key = %key, "Failed to delete orphaned object"),
            }
        }
    }
}

/// A run in the `Received` state: the file name is accepted and a staging area exists.
pub struct PublishRun {
    pipeline: PublishPipeline,
    area: StagingArea,
    author_id: i64,
    file_name: String,
}

impl PublishRun {
    pub fn run_id(&self) -> Uuid {
        self.area.run_id()
    }

    pub fn author_id(&self) -> i64 {
        self.author_id
    }

    /// Sanitized file name used for staging and object keys.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// `Received → Staged`: drain the upload into the staging area.
    pub async fn stage<R>(self, content: R) -> Result<StagedVideo, PublishError>
    where
        R: AsyncRead + Unpin,
    {
        let staged = self.area.stage(&self.file_name, content).await;
        match staged {
            Ok((video_path, size_bytes)) => {
                tracing::info!(
                    author_id = self.author_id,
                    run_id = %self.run_id(),
                    file_name = %self.file_name,
                    size_bytes,
                    state = %PublishState::Staged,
                    "Publish run staged"
                );
                Ok(StagedVideo {
                    run: self,
                    video_path,
                    size_bytes,
                })
            }
            Err(e) => Err(self.fail(PublishState::Received, e.into()).await),
        }
    }

    /// Abandon the run. Used when the request turns out to be unusable after
    /// staging started (for example a second `data` field).
    pub async fn abort(self, err: PublishError) -> PublishError {
        self.fail(PublishState::Received, err).await
    }

    async fn fail(self, reached: PublishState, err: PublishError) -> PublishError {
        let run_id = self.run_id();
        match err.log_level() {
            LogLevel::Debug => tracing::debug!(
                error = %err,
                author_id = self.author_id,
                run_id = %run_id,
                file_name = %self.file_name,
                reached = %reached,
                state = %PublishState::Failed,
                "Publish run failed"
            ),
            LogLevel::Warn => tracing::warn!(
                error = %err,
                author_id = self.author_id,
                run_id = %run_id,
                file_name = %self.file_name,
                reached = %reached,
                state = %PublishState::Failed,
                "Publish run failed"
            ),
            LogLevel::Error => tracing::error!(
                error = %err,
                author_id = self.author_id,
                run_id = %run_id,
                file_name = %self.file_name,
                reached = %reached,
                state = %PublishState::Failed,
                "Publish run failed"
            ),
        }
        self.area.release().await;
        err
    }
}

/// A run in the `Staged` state: the video is on local disk.
pub struct StagedVideo {
    run: PublishRun,
    video_path: PathBuf,
    size_bytes: u64,
}

impl StagedVideo {
    pub fn run_id(&self) -> Uuid {
        self.run.run_id()
    }

    pub fn video_path(&self) -> &Path {
        &self.video_path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Abandon the run after staging, e.g. when the rest of the request is malformed.
    pub async fn abort(self, err: PublishError) -> PublishError {
        self.run.fail(PublishState::Staged, err).await
    }

    /// Drive the run to a terminal state. The staging area is released either way.
    pub async fn publish(self, title: Option<String>) -> Result<Video, PublishError> {
        let mut reached = PublishState::Staged;
        let result = self.complete(title.unwrap_or_default(), &mut reached).await;

        match result {
            Ok(video) => {
                tracing::info!(
                    author_id = self.run.author_id,
                    run_id = %self.run_id(),
                    file_name = %self.run.file_name,
                    video_id = video.id,
                    state = %PublishState::Committed,
                    "Publish run committed"
                );
                self.run.area.release().await;
                Ok(video)
            }
            Err(e) => Err(self.run.fail(reached, e).await),
        }
    }

    async fn complete(&self, title: String, reached: &mut PublishState) -> Result<Video, PublishError> {
        let pipeline = &self.run.pipeline;
        let author_id = self.run.author_id;
        let file_name = self.run.file_name.as_str();

        // Staged → Thumbnailed
        let frame = pipeline.extract_cover(&self.video_path).await?;
        let cover = pipeline.encoder.encode(frame).await?;
        let cover_path = self
            .run
            .area
            .write(&cover_file_name(file_name), &cover)
            .await?;
        *reached = PublishState::Thumbnailed;
        tracing::info!(
            author_id,
            run_id = %self.run_id(),
            file_name = %file_name,
            cover_size_bytes = cover.len(),
            state = %PublishState::Thumbnailed,
            "Cover generated"
        );

        // Thumbnailed → Uploaded, video strictly before cover
        let video_key = video_key(author_id, file_name);
        let cover_key = cover_key(author_id, file_name);
        pipeline
            .upload(
                &self.video_path,
                &video_key,
                video_content_type(file_name),
                PublishStep::UploadVideo,
            )
            .await?;
        if let Err(e) = pipeline
            .upload(&cover_path, &cover_key, "image/jpeg", PublishStep::UploadCover)
            .await
        {
            pipeline.delete_orphans(&[&video_key]).await;
            return Err(e);
        }
        *reached = PublishState::Uploaded;
        tracing::info!(
            author_id,
            run_id = %self.run_id(),
            file_name = %file_name,
            state = %PublishState::Uploaded,
            "Video and cover uploaded"
        );

        // Uploaded → Committed
        let config = pipeline.config();
        let run_id = self.run_id();
        let new_video = NewVideo {
            run_id,
            author_id,
            play_url: public_object_url(&config.bucket, &config.endpoint, &video_key),
            cover_url: public_object_url(&config.bucket, &config.endpoint, &cover_key),
            title,
        };
        let err = match pipeline.commit(&new_video).await {
            Ok(video) => return Ok(video),
            Err(e) => e,
        };
        if !err.commit_outcome_unknown() {
            pipeline.delete_orphans(&[&video_key, &cover_key]).await;
            return Err(err);
        }

        // The row may exist even though the commit reported failure.
        match pipeline.find_committed(run_id).await {
            Ok(Some(video)) => {
                tracing::warn!(
                    error = %err,
                    author_id,
                    run_id = %run_id,
                    video_id = video.id,
                    "Commit reported failure but the video row exists"
                );
                Ok(video)
            }
            Ok(None) => {
                pipeline.delete_orphans(&[&video_key, &cover_key]).await;
                Err(err)
            }
            Err(lookup_err) => {
                tracing::warn!(
                    error = %lookup_err,
                    author_id,
                    run_id = %run_id,
                    "Could not confirm the commit outcome; keeping uploaded objects"
                );
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::ExtractionError;
    use crate::publish::{PersistenceError, RetryPolicy};
    use crate::test_helpers::{staged_file_count, FakeFrameExtractor, TestPipeline};
    use shortvid_storage::StorageError;
    use std::time::Duration;

    fn config() -> PublishConfig {
        let mut config = PublishConfig::new("b", "e.com");
        config.retry = RetryPolicy::new(2, Duration::from_millis(1));
        config
    }

    fn request(content: &'static [u8]) -> UploadRequest<&'static [u8]> {
        UploadRequest {
            author_id: 42,
            file_name: "clip.mp4".to_string(),
            title: Some("hello".to_string()),
            content,
        }
    }

    #[tokio::test]
    async fn successful_run_commits_once_and_cleans_up() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());

        let video = t.pipeline.publish(request(b"five megabytes of video")).await.unwrap();

        assert_eq!(video.author_id, 42);
        assert_eq!(video.title, "hello");
        assert_eq!(video.play_url, "https://b.e.com/42/clip.mp4");
        assert_eq!(video.cover_url, "https://b.e.com/42/clip.mp4-cover.jpeg");
        assert_eq!(t.videos.videos().len(), 1);
        assert_eq!(
            t.storage.object("42/clip.mp4").unwrap(),
            b"five megabytes of video"
        );
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[tokio::test]
    async fn extraction_uses_configured_offset() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.pipeline.publish(request(b"video")).await.unwrap();
        assert_eq!(t.extractor.offsets(), vec![10.0]);
    }

    #[tokio::test]
    async fn video_is_uploaded_before_cover() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.pipeline.publish(request(b"video")).await.unwrap();
        assert_eq!(
            t.storage.put_keys(),
            vec!["42/clip.mp4".to_string(), "42/clip.mp4-cover.jpeg".to_string()]
        );
    }

    #[tokio::test]
    async fn cover_object_is_a_jpeg() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.pipeline.publish(request(b"video")).await.unwrap();
        let cover = t.storage.object("42/clip.mp4-cover.jpeg").unwrap();
        assert_eq!(&cover[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn missing_title_is_stored_empty() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        let mut req = request(b"video");
        req.title = None;
        let video = t.pipeline.publish(req).await.unwrap();
        assert_eq!(video.title, "");
    }

    #[tokio::test]
    async fn commit_failure_leaves_orphans_and_no_video() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.videos
            .fail_next(PersistenceError::Constraint("author does not exist".into()));

        let err = t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert!(matches!(err, PublishError::Persistence(_)));
        assert!(t.videos.videos().is_empty());
        assert_eq!(t.videos.attempts(), 1);
        assert!(t.storage.object("42/clip.mp4").is_some());
        assert!(t.storage.object("42/clip.mp4-cover.jpeg").is_some());
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[tokio::test]
    async fn commit_failure_deletes_orphans_when_enabled() {
        let mut config = config();
        config.delete_orphans = true;
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config);
        t.videos
            .fail_next(PersistenceError::Constraint("author does not exist".into()));

        t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert!(t.storage.object("42/clip.mp4").is_none());
        assert!(t.storage.object("42/clip.mp4-cover.jpeg").is_none());
    }

    #[tokio::test]
    async fn transient_commit_failure_is_retried() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.videos
            .fail_next(PersistenceError::Connection("connection refused".into()));

        t.pipeline.publish(request(b"video")).await.unwrap();

        assert_eq!(t.videos.attempts(), 2);
        assert_eq!(t.videos.videos().len(), 1);
    }

    #[tokio::test]
    async fn lost_commit_ack_does_not_write_a_second_row() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.videos
            .lose_ack_next(PersistenceError::Connection("connection reset by peer".into()));

        let video = t.pipeline.publish(request(b"video")).await.unwrap();

        assert_eq!(t.videos.attempts(), 2);
        let rows = t.videos.videos();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, video.id);
    }

    #[tokio::test]
    async fn commit_timeout_after_write_keeps_the_committed_video() {
        let mut config = config();
        config.commit_timeout = Duration::from_millis(50);
        config.delete_orphans = true;
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config);
        t.videos.hang_after_write_next();

        let video = t.pipeline.publish(request(b"video")).await.unwrap();

        assert_eq!(t.videos.videos().len(), 1);
        assert_eq!(video.play_url, "https://b.e.com/42/clip.mp4");
        assert!(t.storage.delete_keys().is_empty());
        assert!(t.storage.object("42/clip.mp4").is_some());
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[tokio::test]
    async fn unwritten_commit_after_dropped_connections_deletes_orphans_when_enabled() {
        let mut config = config();
        config.delete_orphans = true;
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config);
        for _ in 0..3 {
            t.videos
                .fail_next(PersistenceError::Connection("connection refused".into()));
        }

        let err = t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert!(matches!(err, PublishError::Persistence(PersistenceError::Connection(_))));
        assert!(t.videos.videos().is_empty());
        assert_eq!(
            t.storage.delete_keys(),
            vec!["42/clip.mp4".to_string(), "42/clip.mp4-cover.jpeg".to_string()]
        );
    }

    #[tokio::test]
    async fn unconfirmed_commit_keeps_uploaded_objects() {
        let mut config = config();
        config.delete_orphans = true;
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config);
        for _ in 0..3 {
            t.videos
                .fail_next(PersistenceError::Connection("connection refused".into()));
            t.videos
                .fail_next_lookup(PersistenceError::Connection("connection refused".into()));
        }

        let err = t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert!(matches!(err, PublishError::Persistence(_)));
        assert!(t.storage.delete_keys().is_empty());
        assert!(t.storage.object("42/clip.mp4").is_some());
        assert!(t.storage.object("42/clip.mp4-cover.jpeg").is_some());
    }

    #[tokio::test]
    async fn objects_carry_their_content_types() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.pipeline.publish(request(b"video")).await.unwrap();

        assert_eq!(t.storage.content_type("42/clip.mp4").as_deref(), Some("video/mp4"));
        assert_eq!(
            t.storage.content_type("42/clip.mp4-cover.jpeg").as_deref(),
            Some("image/jpeg")
        );
    }

    #[tokio::test]
    async fn extraction_failure_uploads_and_commits_nothing() {
        let t = TestPipeline::new(FakeFrameExtractor::failing(), config());

        let err = t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert!(matches!(err, PublishError::Extraction(ExtractionError::Failed { .. })));
        assert!(t.storage.put_keys().is_empty());
        assert!(t.videos.videos().is_empty());
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[tokio::test]
    async fn offset_beyond_duration_is_extraction_error() {
        let t = TestPipeline::new(FakeFrameExtractor::beyond_duration(), config());

        let err = t.pipeline.publish(request(b"a two second clip")).await.unwrap_err();

        assert!(matches!(
            err,
            PublishError::Extraction(ExtractionError::OffsetBeyondDuration { .. })
        ));
        assert!(t.videos.videos().is_empty());
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[tokio::test]
    async fn malformed_frame_is_encode_error() {
        let t = TestPipeline::new(FakeFrameExtractor::returning(b"garbage".to_vec()), config());

        let err = t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert!(matches!(err, PublishError::Encode(_)));
        assert!(t.storage.put_keys().is_empty());
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[tokio::test]
    async fn video_upload_failure_skips_cover_and_commit() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.storage
            .fail_next("42/clip.mp4", StorageError::NotFound("bucket b".into()));

        let err = t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert!(matches!(err, PublishError::Storage { ref key, .. } if key == "42/clip.mp4"));
        assert_eq!(t.storage.attempts(), 1);
        assert!(t.storage.put_keys().is_empty());
        assert!(t.videos.videos().is_empty());
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[tokio::test]
    async fn cover_upload_failure_keeps_video_object_by_default() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.storage.fail_next(
            "42/clip.mp4-cover.jpeg",
            StorageError::InvalidKey("42/clip.mp4-cover.jpeg".into()),
        );

        t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert_eq!(t.storage.put_keys(), vec!["42/clip.mp4".to_string()]);
        assert!(t.storage.delete_keys().is_empty());
        assert!(t.videos.videos().is_empty());
    }

    #[tokio::test]
    async fn cover_upload_failure_deletes_video_when_enabled() {
        let mut config = config();
        config.delete_orphans = true;
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config);
        t.storage.fail_next(
            "42/clip.mp4-cover.jpeg",
            StorageError::InvalidKey("42/clip.mp4-cover.jpeg".into()),
        );

        t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert_eq!(t.storage.delete_keys(), vec!["42/clip.mp4".to_string()]);
        assert!(t.storage.object("42/clip.mp4").is_none());
    }

    #[tokio::test]
    async fn transient_upload_failure_is_retried() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        t.storage
            .fail_next("42/clip.mp4", StorageError::Unavailable("connection reset".into()));

        t.pipeline.publish(request(b"video")).await.unwrap();

        assert_eq!(t.storage.attempts(), 3);
        assert_eq!(t.videos.videos().len(), 1);
    }

    #[tokio::test]
    async fn retries_stop_after_budget() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        for _ in 0..3 {
            t.storage
                .fail_next("42/clip.mp4", StorageError::Unavailable("connection reset".into()));
        }

        let err = t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(t.storage.attempts(), 3);
        assert!(t.videos.videos().is_empty());
    }

    #[tokio::test]
    async fn hung_extraction_times_out() {
        let mut config = config();
        config.extract_timeout = Duration::from_millis(50);
        let t = TestPipeline::new(FakeFrameExtractor::hanging(), config);

        let err = t.pipeline.publish(request(b"video")).await.unwrap_err();

        assert!(matches!(
            err,
            PublishError::Timeout {
                step: PublishStep::Extract,
                ..
            }
        ));
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[tokio::test]
    async fn disallowed_extension_stages_nothing() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());
        let mut req = request(b"#!/bin/sh");
        req.file_name = "clip.sh".to_string();

        let err = t.pipeline.publish(req).await.unwrap_err();

        assert!(matches!(err, PublishError::InvalidUpload(_)));
        assert_eq!(t.extractor.calls(), 0);
        assert!(!t.staging_root().join("42").exists());
    }

    #[tokio::test]
    async fn cancelled_run_still_releases_staging() {
        let t = TestPipeline::new(FakeFrameExtractor::hanging(), config());

        let outcome = tokio::time::timeout(
            Duration::from_millis(50),
            t.pipeline.publish(request(b"video")),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[tokio::test]
    async fn concurrent_runs_with_same_name_do_not_collide() {
        let t = TestPipeline::new(FakeFrameExtractor::returning_png(), config());

        let first = t.pipeline.begin(42, "clip.mp4").await.unwrap();
        let second = t.pipeline.begin(42, "clip.mp4").await.unwrap();
        let first = first.stage(&b"first"[..]).await.unwrap();
        let second = second.stage(&b"second"[..]).await.unwrap();

        assert_ne!(first.video_path(), second.video_path());
        assert_eq!(std::fs::read(first.video_path()).unwrap(), b"first");
        assert_eq!(std::fs::read(second.video_path()).unwrap(), b"second");

        let (a, b) = tokio::join!(first.publish(None), second.publish(None));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(t.videos.videos().len(), 2);
        assert_eq!(staged_file_count(t.staging_root()), 0);
    }

    #[test]
    fn sanitize_keeps_final_component_only() {
        let allowed = config().allowed_extensions;
        assert_eq!(
            sanitize_file_name("C:\\Users\\me\\clip.mp4", &allowed).unwrap(),
            "clip.mp4"
        );
        assert_eq!(
            sanitize_file_name("/tmp/../../clip.mp4", &allowed).unwrap(),
            "clip.mp4"
        );
        assert_eq!(
            sanitize_file_name("my holiday clip.MP4", &allowed).unwrap(),
            "my_holiday_clip.MP4"
        );
    }

    #[test]
    fn sanitize_rejects_bad_names() {
        let allowed = config().allowed_extensions;
        assert!(sanitize_file_name("", &allowed).is_err());
        assert!(sanitize_file_name("clip/", &allowed).is_err());
        assert!(sanitize_file_name("..mp4", &allowed).is_err());
        assert!(sanitize_file_name("clip", &allowed).is_err());
        assert!(sanitize_file_name(".mp4", &allowed).is_err());
        assert!(sanitize_file_name("clip.exe", &allowed).is_err());
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(video_content_type("clip.mp4"), "video/mp4");
        assert_eq!(video_content_type("clip.MOV"), "video/quicktime");
        assert_eq!(video_content_type("clip"), "application/octet-stream");
    }
}
