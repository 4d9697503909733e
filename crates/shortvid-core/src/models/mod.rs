//! Data models for the application
//!
//! Rows persisted by `shortvid-db` and the response shapes built from them.

mod follow;
mod user;
mod video;

pub use follow::*;
pub use user::*;
pub use video::*;
