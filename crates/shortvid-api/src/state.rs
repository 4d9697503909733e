//! Application state and sub-states.

use std::sync::Arc;

use shortvid_db::{FollowRepository, UserRepository, VideoRepository};
use shortvid_processing::PublishPipeline;
use sqlx::PgPool;

use crate::auth::JwtKeys;

/// Database pool and repositories.
#[derive(Clone)]
pub struct DbState {
    pub pool: PgPool,
    pub video_repository: VideoRepository,
    pub follow_repository: FollowRepository,
    pub user_repository: UserRepository,
}

impl DbState {
    pub fn new(pool: PgPool) -> Self {
        Self {
            video_repository: VideoRepository::new(pool.clone()),
            follow_repository: FollowRepository::new(pool.clone()),
            user_repository: UserRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Publish pipeline and the limits applied to uploads.
#[derive(Clone)]
pub struct PublisherState {
    pub pipeline: PublishPipeline,
    pub max_video_size_bytes: usize,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt: JwtKeys,
}

pub struct AppState {
    pub db: DbState,
    pub publisher: PublisherState,
    pub security: SecurityConfig,
}

impl AppState {
    pub fn new(db: DbState, publisher: PublisherState, security: SecurityConfig) -> Arc<Self> {
        Arc::new(Self {
            db,
            publisher,
            security,
        })
    }
}
