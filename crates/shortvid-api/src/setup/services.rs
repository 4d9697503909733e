//! Pipeline and repository wiring

use anyhow::{Context, Result};
use shortvid_core::Config;
use shortvid_processing::{FfmpegFrameExtractor, PublishConfig, PublishPipeline, StagingStore};
use shortvid_storage::Storage;
use sqlx::PgPool;
use std::sync::Arc;

use crate::auth::JwtKeys;
use crate::state::{AppState, DbState, PublisherState, SecurityConfig};
use crate::video_store_impl::PgVideoStore;

pub async fn initialize_services(
    config: &Config,
    pool: PgPool,
    storage: Arc<dyn Storage>,
) -> Result<Arc<AppState>> {
    let db = DbState::new(pool);

    tokio::fs::create_dir_all(config.staging_dir())
        .await
        .with_context(|| {
            format!(
                "Failed to create staging directory {}",
                config.staging_dir().display()
            )
        })?;

    let extractor =
        FfmpegFrameExtractor::new(config.ffmpeg_path()).context("Invalid FFMPEG_PATH")?;
    let videos = PgVideoStore::new(db.video_repository.clone());
    let publish_config = PublishConfig::from_config(config);

    tracing::info!(
        staging_dir = %config.staging_dir().display(),
        ffmpeg_path = %config.ffmpeg_path(),
        cover_offset_seconds = publish_config.cover_offset_seconds,
        max_retries = publish_config.retry.max_retries,
        delete_orphans = publish_config.delete_orphans,
        "Publish pipeline configured"
    );

    let pipeline = PublishPipeline::new(
        StagingStore::new(config.staging_dir()),
        Arc::new(extractor),
        storage,
        Arc::new(videos),
        publish_config,
    );

    Ok(AppState::new(
        db,
        PublisherState {
            pipeline,
            max_video_size_bytes: config.max_video_size_bytes(),
        },
        SecurityConfig {
            jwt: JwtKeys::new(config.jwt_secret(), config.jwt_expiry_hours()),
        },
    ))
}
