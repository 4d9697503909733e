//! Storage setup and initialization

use anyhow::Result;
use shortvid_core::Config;
use shortvid_storage::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = create_storage(config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize storage: {}", e))?;

    tracing::info!(
        backend = ?storage.backend_type(),
        bucket = ?config.s3_bucket(),
        "Storage initialized"
    );

    Ok(storage)
}
