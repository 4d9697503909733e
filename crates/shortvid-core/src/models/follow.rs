use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A follow edge: `follower_id` follows `user_id`.
///
/// Unfollowing keeps the row and sets `cancel`; only rows with `cancel = false`
/// count towards follower and following totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Follow {
    pub id: i64,
    pub user_id: i64,
    pub follower_id: i64,
    pub cancel: bool,
    pub created_at: DateTime<Utc>,
}

impl Follow {
    pub fn is_active(&self) -> bool {
        !self.cancel
    }
}

/// Relation action codes accepted by the relation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationAction {
    Follow,
    Unfollow,
}

impl RelationAction {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(RelationAction::Follow),
            2 => Some(RelationAction::Unfollow),
            _ => None,
        }
    }
}
