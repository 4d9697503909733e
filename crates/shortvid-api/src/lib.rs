//! Shortvid API Library
//!
//! HTTP handlers, middleware and application setup for the publish and
//! relation endpoints.

mod handlers;
mod middleware;
mod telemetry;
mod video_store_impl;

pub mod auth;
pub mod error;
pub mod setup;
pub mod state;

pub use error::HttpAppError;
pub use video_store_impl::PgVideoStore;
