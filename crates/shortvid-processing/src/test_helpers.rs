//! In-memory fakes for exercising the publish pipeline without ffmpeg,
//! object storage or a database.

use async_trait::async_trait;
use chrono::Utc;
use shortvid_core::models::{NewVideo, Video};
use shortvid_storage::{Storage, StorageBackend, StorageError, StorageResult};
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

use crate::extractor::{ExtractionError, FrameExtractor};
use crate::publish::{PersistenceError, PublishConfig, PublishPipeline, VideoStore};
use crate::staging::StagingStore;

/// A small valid PNG, standing in for an ffmpeg frame.
pub fn png_frame() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(16, 9, image::Rgb([30, 144, 255]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode test frame");
    buf
}

/// Number of regular files anywhere under `root`.
pub fn staged_file_count(root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                staged_file_count(&path)
            } else {
                1
            }
        })
        .sum()
}

enum ExtractBehavior {
    Frame(Vec<u8>),
    Fail,
    BeyondDuration,
    Hang,
}

/// Scripted [`FrameExtractor`].
pub struct FakeFrameExtractor {
    behavior: ExtractBehavior,
    offsets: Mutex<Vec<f64>>,
}

impl FakeFrameExtractor {
    fn with(behavior: ExtractBehavior) -> Self {
        Self {
            behavior,
            offsets: Mutex::new(Vec::new()),
        }
    }

    pub fn returning_png() -> Self {
        Self::with(ExtractBehavior::Frame(png_frame()))
    }

    pub fn returning(frame: Vec<u8>) -> Self {
        Self::with(ExtractBehavior::Frame(frame))
    }

    pub fn failing() -> Self {
        Self::with(ExtractBehavior::Fail)
    }

    pub fn beyond_duration() -> Self {
        Self::with(ExtractBehavior::BeyondDuration)
    }

    /// Never returns within a test's lifetime.
    pub fn hanging() -> Self {
        Self::with(ExtractBehavior::Hang)
    }

    pub fn calls(&self) -> usize {
        self.offsets.lock().unwrap().len()
    }

    pub fn offsets(&self) -> Vec<f64> {
        self.offsets.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameExtractor for FakeFrameExtractor {
    async fn extract_frame(
        &self,
        video_path: &Path,
        offset_seconds: f64,
    ) -> Result<Vec<u8>, ExtractionError> {
        self.offsets.lock().unwrap().push(offset_seconds);
        if !video_path.is_file() {
            return Err(ExtractionError::Unreadable(video_path.to_path_buf()));
        }
        match &self.behavior {
            ExtractBehavior::Frame(frame) => Ok(frame.clone()),
            ExtractBehavior::Fail => Err(ExtractionError::Failed {
                status: "exit status: 1".to_string(),
                stderr: "Invalid data found when processing input".to_string(),
            }),
            ExtractBehavior::BeyondDuration => Err(ExtractionError::OffsetBeyondDuration {
                offset: offset_seconds,
            }),
            ExtractBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ExtractionError::OffsetBeyondDuration {
                    offset: offset_seconds,
                })
            }
        }
    }
}

/// Mock storage that keeps uploaded objects in memory
#[derive(Default)]
pub struct MockStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<Vec<String>>,
    content_types: Mutex<HashMap<String, String>>,
    deletes: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, VecDeque<StorageError>>>,
    attempts: AtomicUsize,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next upload of `key` fail with `error`. Queues up.
    pub fn fail_next(&self, key: &str, error: StorageError) {
        self.failures
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(error);
    }

    /// Keys of successful uploads, in order.
    pub fn put_keys(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn delete_keys(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Content type the last successful upload of `key` was stored with.
    pub fn content_type(&self, key: &str) -> Option<String> {
        self.content_types.lock().unwrap().get(key).cloned()
    }

    /// Upload attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn put_file(
        &self,
        local_path: &Path,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let failure = self
            .failures
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(VecDeque::pop_front);
        if let Some(error) = failure {
            return Err(error);
        }

        let data = tokio::fs::read(local_path).await?;
        self.objects.lock().unwrap().insert(key.to_string(), data);
        self.content_types
            .lock()
            .unwrap()
            .insert(key.to_string(), content_type.to_string());
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(key);
        self.deletes.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

enum StoreFault {
    /// Fail before anything is written.
    Fail(PersistenceError),
    /// Write the row, then report `error` as if the acknowledgement was lost.
    WriteThenFail(PersistenceError),
    /// Write the row, then never answer.
    WriteThenHang,
}

/// In-memory [`VideoStore`] with injectable failures.
///
/// Rows are keyed by run id like the Postgres table, so repeated writes for a
/// run return the first row.
pub struct MockVideoStore {
    videos: Mutex<Vec<Video>>,
    faults: Mutex<VecDeque<StoreFault>>,
    lookup_failures: Mutex<VecDeque<PersistenceError>>,
    next_id: AtomicI64,
    attempts: AtomicUsize,
}

impl Default for MockVideoStore {
    fn default() -> Self {
        Self {
            videos: Mutex::new(Vec::new()),
            faults: Mutex::new(VecDeque::new()),
            lookup_failures: Mutex::new(VecDeque::new()),
            next_id: AtomicI64::new(1),
            attempts: AtomicUsize::new(0),
        }
    }
}

impl MockVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: PersistenceError) {
        self.faults.lock().unwrap().push_back(StoreFault::Fail(error));
    }

    /// Make the next write succeed in the store but report `error` to the caller.
    pub fn lose_ack_next(&self, error: PersistenceError) {
        self.faults
            .lock()
            .unwrap()
            .push_back(StoreFault::WriteThenFail(error));
    }

    /// Make the next write succeed in the store but never return.
    pub fn hang_after_write_next(&self) {
        self.faults.lock().unwrap().push_back(StoreFault::WriteThenHang);
    }

    pub fn fail_next_lookup(&self, error: PersistenceError) {
        self.lookup_failures.lock().unwrap().push_back(error);
    }

    pub fn videos(&self) -> Vec<Video> {
        self.videos.lock().unwrap().clone()
    }

    /// Write attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn upsert(&self, video: &NewVideo) -> Video {
        let mut videos = self.videos.lock().unwrap();
        if let Some(existing) = videos.iter().find(|v| v.run_id == video.run_id) {
            return existing.clone();
        }
        let stored = Video {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            author_id: video.author_id,
            play_url: video.play_url.clone(),
            cover_url: video.cover_url.clone(),
            title: video.title.clone(),
            run_id: video.run_id,
            created_at: Utc::now(),
        };
        videos.push(stored.clone());
        stored
    }
}

#[async_trait]
impl VideoStore for MockVideoStore {
    async fn create(&self, video: &NewVideo) -> Result<Video, PersistenceError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let fault = self.faults.lock().unwrap().pop_front();
        match fault {
            Some(StoreFault::Fail(error)) => Err(error),
            Some(StoreFault::WriteThenFail(error)) => {
                self.upsert(video);
                Err(error)
            }
            Some(StoreFault::WriteThenHang) => {
                let stored = self.upsert(video);
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(stored)
            }
            None => Ok(self.upsert(video)),
        }
    }

    async fn find_by_run_id(&self, run_id: Uuid) -> Result<Option<Video>, PersistenceError> {
        if let Some(error) = self.lookup_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(self
            .videos
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.run_id == run_id)
            .cloned())
    }
}

/// A pipeline wired to fakes, with a temporary staging root.
pub struct TestPipeline {
    pub pipeline: PublishPipeline,
    pub extractor: Arc<FakeFrameExtractor>,
    pub storage: Arc<MockStorage>,
    pub videos: Arc<MockVideoStore>,
    staging_root: TempDir,
}

impl TestPipeline {
    pub fn new(extractor: FakeFrameExtractor, config: PublishConfig) -> Self {
        let staging_root = TempDir::new().expect("create staging root");
        let extractor = Arc::new(extractor);
        let storage = Arc::new(MockStorage::new());
        let videos = Arc::new(MockVideoStore::new());

        let pipeline = PublishPipeline::new(
            StagingStore::new(staging_root.path()),
            extractor.clone(),
            storage.clone(),
            videos.clone(),
            config,
        );

        Self {
            pipeline,
            extractor,
            storage,
            videos,
            staging_root,
        }
    }

    pub fn staging_root(&self) -> &Path {
        self.staging_root.path()
    }
}
