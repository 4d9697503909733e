//! Follow graph endpoints
//!
//! - `POST /douyin/relation/action/?to_user_id=&action_type=` (1 follow, 2 unfollow)
//! - `GET /douyin/relation/follow/list/?user_id=`: users `user_id` follows
//! - `GET /douyin/relation/follower/list/?user_id=`: users following `user_id`
//!
//! `user_id` defaults to the authenticated user.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use shortvid_core::models::{RelationAction, UserResponse, UserStats};
use shortvid_core::{AppError, StatusResponse, UserListResponse};

use crate::auth::CurrentUser;
use crate::error::HttpAppError;
use crate::state::{AppState, DbState};

#[derive(Debug, Deserialize)]
pub struct RelationActionQuery {
    pub to_user_id: i64,
    pub action_type: i32,
}

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub user_id: Option<i64>,
}

pub async fn relation_action(
    State(state): State<Arc<AppState>>,
    CurrentUser(current_user): CurrentUser,
    query: Result<Query<RelationActionQuery>, QueryRejection>,
) -> Result<Json<StatusResponse>, HttpAppError> {
    let Query(query) = query?;

    let action = RelationAction::from_code(query.action_type).ok_or_else(|| {
        AppError::InvalidInput(format!("Unknown action_type: {}", query.action_type))
    })?;

    if query.to_user_id == current_user {
        return Err(AppError::InvalidInput("You cannot follow yourself".to_string()).into());
    }

    let db = &state.db;
    match action {
        RelationAction::Follow => {
            if db.user_repository.get_by_id(query.to_user_id).await?.is_none() {
                return Err(AppError::NotFound("User not found".to_string()).into());
            }
            let follow = db
                .follow_repository
                .create_follow(query.to_user_id, current_user)
                .await?;
            tracing::info!(
                user_id = query.to_user_id,
                follower_id = current_user,
                follow_id = follow.id,
                "User followed"
            );
        }
        RelationAction::Unfollow => {
            let cancelled = db
                .follow_repository
                .cancel_follow(query.to_user_id, current_user)
                .await?;
            if cancelled {
                tracing::info!(
                    user_id = query.to_user_id,
                    follower_id = current_user,
                    "User unfollowed"
                );
            } else {
                tracing::debug!(
                    user_id = query.to_user_id,
                    follower_id = current_user,
                    "Unfollow without an active follow"
                );
            }
        }
    }

    Ok(Json(StatusResponse::ok()))
}

pub async fn follow_list(
    State(state): State<Arc<AppState>>,
    CurrentUser(current_user): CurrentUser,
    query: Result<Query<UserListQuery>, QueryRejection>,
) -> Result<Json<UserListResponse>, HttpAppError> {
    let Query(query) = query?;
    let user_id = query.user_id.unwrap_or(current_user);

    let ids = state.db.follow_repository.following_ids(user_id).await?;
    let user_list = user_responses(&state.db, &ids, current_user).await?;

    Ok(Json(UserListResponse::ok(user_list)))
}

pub async fn follower_list(
    State(state): State<Arc<AppState>>,
    CurrentUser(current_user): CurrentUser,
    query: Result<Query<UserListQuery>, QueryRejection>,
) -> Result<Json<UserListResponse>, HttpAppError> {
    let Query(query) = query?;
    let user_id = query.user_id.unwrap_or(current_user);

    let ids = state.db.follow_repository.follower_ids(user_id).await?;
    let user_list = user_responses(&state.db, &ids, current_user).await?;

    Ok(Json(UserListResponse::ok(user_list)))
}

/// Render `ids` as seen by `viewer`. Ids without a profile are skipped.
async fn user_responses(
    db: &DbState,
    ids: &[i64],
    viewer: i64,
) -> Result<Vec<UserResponse>, AppError> {
    let mut users = Vec::with_capacity(ids.len());
    for &id in ids {
        let Some(user) = db.user_repository.get_by_id(id).await? else {
            tracing::warn!(user_id = id, "Skipping relation to a user without a profile");
            continue;
        };

        let stats = UserStats {
            follow_count: db.follow_repository.following_count(id).await?,
            follower_count: db.follow_repository.follower_count(id).await?,
            work_count: db.video_repository.count_by_author(id).await?,
            is_follow: db.follow_repository.is_following(id, viewer).await?,
        };
        users.push(UserResponse::new(user, stats));
    }
    Ok(users)
}
