//! Route configuration and setup

use crate::handlers;
use crate::middleware::request_id_middleware;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use shortvid_core::Config;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Headroom on top of the video itself for multipart boundaries and the title field.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router, anyhow::Error> {
    let body_limit = config.max_video_size_bytes() + MULTIPART_OVERHEAD_BYTES;
    tracing::info!(
        max_video_mb = config.max_video_size_bytes() / 1024 / 1024,
        video_extensions = %config.video_allowed_extensions().join(","),
        "Routes configured"
    );
    Ok(app_router(state, body_limit))
}

/// Router with every endpoint and the shared middleware stack.
pub fn app_router(state: Arc<AppState>, body_limit: usize) -> Router {
    let publish_routes = Router::new()
        .route(
            "/douyin/publish/action/",
            post(handlers::publish::publish_video),
        )
        // The publish body is bounded by RequestBodyLimitLayer instead of axum's 2 MB default.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit));

    let relation_routes = Router::new()
        .route(
            "/douyin/relation/action/",
            post(handlers::relation::relation_action),
        )
        .route(
            "/douyin/relation/follow/list/",
            get(handlers::relation::follow_list),
        )
        .route(
            "/douyin/relation/follower/list/",
            get(handlers::relation::follower_list),
        );

    Router::new()
        .route("/health", get(handlers::health::health))
        .merge(publish_routes)
        .merge(relation_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http()),
        )
        .with_state(state)
}
