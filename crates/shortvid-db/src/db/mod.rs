//! Database repositories for data access layer
//!
//! Each repository owns one table and returns `AppError` on failure.

pub mod follow;
pub mod user;
pub mod video;

pub use follow::FollowRepository;
pub use user::UserRepository;
pub use video::VideoRepository;
