//! VideoStore implementation backed by the Postgres video repository.

use async_trait::async_trait;
use shortvid_core::models::{NewVideo, Video};
use shortvid_core::AppError;
use shortvid_db::VideoRepository;
use shortvid_processing::{PersistenceError, VideoStore};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgVideoStore {
    repository: VideoRepository,
}

impl PgVideoStore {
    pub fn new(repository: VideoRepository) -> Self {
        Self { repository }
    }
}

/// Split database failures into the ones worth retrying and the ones that are not.
fn to_persistence_error(err: AppError) -> PersistenceError {
    match err {
        AppError::Database(sqlx_err) => match &sqlx_err {
            sqlx::Error::Database(db_err) if db_err.constraint().is_some() => {
                PersistenceError::Constraint(sqlx_err.to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => PersistenceError::Connection(sqlx_err.to_string()),
            _ => PersistenceError::Other(sqlx_err.to_string()),
        },
        other => PersistenceError::Other(other.to_string()),
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    async fn create(&self, video: &NewVideo) -> Result<Video, PersistenceError> {
        self.repository
            .create(video)
            .await
            .map_err(to_persistence_error)
    }

    async fn find_by_run_id(&self, run_id: Uuid) -> Result<Option<Video>, PersistenceError> {
        self.repository
            .get_by_run_id(run_id)
            .await
            .map_err(to_persistence_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_are_connection_errors() {
        let err = to_persistence_error(AppError::Database(sqlx::Error::PoolTimedOut));
        assert!(matches!(err, PersistenceError::Connection(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn row_not_found_is_not_retryable() {
        let err = to_persistence_error(AppError::Database(sqlx::Error::RowNotFound));
        assert!(matches!(err, PersistenceError::Other(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn non_database_errors_map_to_other() {
        let err = to_persistence_error(AppError::Internal("boom".to_string()));
        assert!(matches!(err, PersistenceError::Other(_)));
    }
}
