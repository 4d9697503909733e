use serde::{Deserialize, Serialize};

/// Account profile. Owned by the account subsystem; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub name: String,
    pub avatar: Option<String>,
    pub background_image: Option<String>,
    pub signature: Option<String>,
}

/// Social counters computed for a user relative to the viewer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub follow_count: i64,
    pub follower_count: i64,
    pub work_count: i64,
    pub is_follow: bool,
}

/// User as rendered in relation lists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub follow_count: i64,
    pub follower_count: i64,
    pub is_follow: bool,
    pub avatar: String,
    pub background_image: String,
    pub signature: String,
    pub total_favorite: i64,
    pub work_count: i64,
    pub favorite_count: i64,
}

impl UserResponse {
    /// Favorites are not tracked by this service, so both favorite counters are zero.
    pub fn new(user: User, stats: UserStats) -> Self {
        Self {
            id: user.id,
            name: user.name,
            follow_count: stats.follow_count,
            follower_count: stats.follower_count,
            is_follow: stats.is_follow,
            avatar: user.avatar.unwrap_or_default(),
            background_image: user.background_image.unwrap_or_default(),
            signature: user.signature.unwrap_or_default(),
            total_favorite: 0,
            work_count: stats.work_count,
            favorite_count: 0,
        }
    }
}
