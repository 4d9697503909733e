use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A published video. Immutable once committed by the publish pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Video {
    pub id: i64,
    pub author_id: i64,
    pub play_url: String,
    pub cover_url: String,
    pub title: String,
    /// Publish run that wrote this row; at most one row per run.
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a video row; the id is assigned by the store.
///
/// Writing the same `run_id` twice yields the row from the first write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewVideo {
    pub run_id: Uuid,
    pub author_id: i64,
    pub play_url: String,
    pub cover_url: String,
    pub title: String,
}
