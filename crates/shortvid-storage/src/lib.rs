//! Shortvid Storage Library
//!
//! Object storage for published videos and their covers. The publish pipeline
//! only ever uploads files that are already staged on local disk, so the
//! [`Storage`] trait is file based.
//!
//! # Storage key format
//!
//! Keys are author-scoped: `{author_id}/{file_name}` for the video and
//! `{author_id}/{file_name}-cover.jpeg` for its cover. Keys must not contain
//! `..` or a leading `/`.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Settings, S3Storage};
pub use shortvid_core::StorageBackend;
pub use traits::{validate_key, Storage, StorageError, StorageResult};
