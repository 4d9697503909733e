//! Shortvid Core Library
//!
//! Configuration, error types, domain models and wire envelopes shared by
//! every shortvid crate.

pub mod config;
pub mod error;
pub mod models;
pub mod response;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PublisherConfig};
pub use error::{status, AppError, ErrorMetadata, LogLevel};
pub use response::{StatusResponse, UserListResponse};
pub use storage_types::StorageBackend;
