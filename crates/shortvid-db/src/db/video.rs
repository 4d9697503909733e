use shortvid_core::{
    models::{NewVideo, Video},
    AppError,
};
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Repository for published videos
#[derive(Clone)]
pub struct VideoRepository {
    pool: PgPool,
}

impl VideoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a video row and return it with its assigned id.
    ///
    /// Idempotent per `run_id`: repeating the insert returns the existing row
    /// unchanged, so a commit retried after a lost acknowledgement cannot
    /// create a second video.
    #[tracing::instrument(skip(self, video), fields(db.table = "videos", db.operation = "insert", author_id = video.author_id, run_id = %video.run_id))]
    pub async fn create(&self, video: &NewVideo) -> Result<Video, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(
            r#"
            INSERT INTO videos (run_id, author_id, play_url, cover_url, title)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (run_id) DO UPDATE SET run_id = EXCLUDED.run_id
            RETURNING id, author_id, play_url, cover_url, title, run_id, created_at
            "#,
        )
        .bind(video.run_id)
        .bind(video.author_id)
        .bind(&video.play_url)
        .bind(&video.cover_url)
        .bind(&video.title)
        .fetch_one(&self.pool)
        .await?;

        Ok(video)
    }

    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select", db.record_id = id))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(
            "SELECT id, author_id, play_url, cover_url, title, run_id, created_at FROM videos WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    /// The row written by a publish run, if its commit reached the database.
    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "select"))]
    pub async fn get_by_run_id(&self, run_id: Uuid) -> Result<Option<Video>, AppError> {
        let video = sqlx::query_as::<Postgres, Video>(
            "SELECT id, author_id, play_url, cover_url, title, run_id, created_at FROM videos WHERE run_id = $1",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(video)
    }

    /// Number of videos published by an author
    #[tracing::instrument(skip(self), fields(db.table = "videos", db.operation = "count"))]
    pub async fn count_by_author(&self, author_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM videos WHERE author_id = $1",
        )
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}
