use shortvid_core::{models::Follow, AppError};
use sqlx::{PgPool, Postgres};

const FOLLOW_COLUMNS: &str = "id, user_id, follower_id, cancel, created_at";

/// Repository for follow edges between users
///
/// `user_id` is the followed user and `follower_id` the fan. Unfollowing sets
/// `cancel` instead of deleting, and every read below ignores cancelled rows
/// unless it says otherwise.
#[derive(Clone)]
pub struct FollowRepository {
    pool: PgPool,
}

impl FollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record that `follower_id` follows `user_id`, re-activating a cancelled edge.
    #[tracing::instrument(skip(self), fields(db.table = "follows", db.operation = "upsert"))]
    pub async fn create_follow(&self, user_id: i64, follower_id: i64) -> Result<Follow, AppError> {
        let follow = sqlx::query_as::<Postgres, Follow>(&format!(
            r#"
            INSERT INTO follows (user_id, follower_id, cancel)
            VALUES ($1, $2, FALSE)
            ON CONFLICT (user_id, follower_id) DO UPDATE SET cancel = FALSE
            RETURNING {FOLLOW_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(follower_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(follow)
    }

    /// Get a follow row by primary key, cancelled or not
    #[tracing::instrument(skip(self), fields(db.table = "follows", db.operation = "select", db.record_id = id))]
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Follow>, AppError> {
        let follow = sqlx::query_as::<Postgres, Follow>(&format!(
            "SELECT {FOLLOW_COLUMNS} FROM follows WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(follow)
    }

    /// Active edges pointing at `user_id` (its fans)
    #[tracing::instrument(skip(self), fields(db.table = "follows", db.operation = "select"))]
    pub async fn follower_records(&self, user_id: i64) -> Result<Vec<Follow>, AppError> {
        let follows = sqlx::query_as::<Postgres, Follow>(&format!(
            "SELECT {FOLLOW_COLUMNS} FROM follows WHERE user_id = $1 AND cancel = FALSE ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(follows)
    }

    pub async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let records = self.follower_records(user_id).await?;
        Ok(records.into_iter().map(|f| f.follower_id).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "follows", db.operation = "count"))]
    pub async fn follower_count(&self, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM follows WHERE user_id = $1 AND cancel = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Active edges from `user_id` to the users it follows
    #[tracing::instrument(skip(self), fields(db.table = "follows", db.operation = "select"))]
    pub async fn following_records(&self, user_id: i64) -> Result<Vec<Follow>, AppError> {
        let follows = sqlx::query_as::<Postgres, Follow>(&format!(
            "SELECT {FOLLOW_COLUMNS} FROM follows WHERE follower_id = $1 AND cancel = FALSE ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(follows)
    }

    pub async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let records = self.following_records(user_id).await?;
        Ok(records.into_iter().map(|f| f.user_id).collect())
    }

    #[tracing::instrument(skip(self), fields(db.table = "follows", db.operation = "count"))]
    pub async fn following_count(&self, user_id: i64) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<Postgres, i64>(
            "SELECT COUNT(*) FROM follows WHERE follower_id = $1 AND cancel = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// The edge between two users, including a cancelled one
    #[tracing::instrument(skip(self), fields(db.table = "follows", db.operation = "select"))]
    pub async fn relation(
        &self,
        user_id: i64,
        follower_id: i64,
    ) -> Result<Option<Follow>, AppError> {
        let follow = sqlx::query_as::<Postgres, Follow>(&format!(
            "SELECT {FOLLOW_COLUMNS} FROM follows WHERE user_id = $1 AND follower_id = $2"
        ))
        .bind(user_id)
        .bind(follower_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(follow)
    }

    /// Whether `follower_id` currently follows `user_id`. False when no edge exists.
    pub async fn is_following(&self, user_id: i64, follower_id: i64) -> Result<bool, AppError> {
        Ok(self
            .relation(user_id, follower_id)
            .await?
            .is_some_and(|f| f.is_active()))
    }

    #[tracing::instrument(skip(self), fields(db.table = "follows", db.operation = "update", db.record_id = id))]
    pub async fn set_cancel_by_id(&self, id: i64, cancel: bool) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE follows SET cancel = $2 WHERE id = $1")
            .bind(id)
            .bind(cancel)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Follow record {} not found", id)));
        }

        Ok(())
    }

    /// Mark the edge cancelled. Returns whether an edge existed.
    #[tracing::instrument(skip(self), fields(db.table = "follows", db.operation = "update"))]
    pub async fn cancel_follow(&self, user_id: i64, follower_id: i64) -> Result<bool, AppError> {
        let result =
            sqlx::query("UPDATE follows SET cancel = TRUE WHERE user_id = $1 AND follower_id = $2")
                .bind(user_id)
                .bind(follower_id)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }
}
