use async_trait::async_trait;
use shortvid_core::models::{NewVideo, Video};
use uuid::Uuid;

use super::errors::PersistenceError;

/// Video metadata sink used by the pipeline's commit step.
///
/// The API crate implements this over the Postgres repository; tests use an
/// in-memory store.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Write the row for `video.run_id`. Must be idempotent per run: a second
    /// call for the same run returns the row already written.
    async fn create(&self, video: &NewVideo) -> Result<Video, PersistenceError>;

    /// Look up the row a run wrote, used to settle a commit whose outcome was lost.
    async fn find_by_run_id(&self, run_id: Uuid) -> Result<Option<Video>, PersistenceError>;
}
