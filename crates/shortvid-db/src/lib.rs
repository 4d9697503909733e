//! Shortvid DB Library
//!
//! Postgres repositories for videos, follow edges and user profiles.

pub mod db;

pub use db::{FollowRepository, UserRepository, VideoRepository};
