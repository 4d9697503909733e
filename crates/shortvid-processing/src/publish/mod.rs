//! Publish pipeline
//!
//! `Received → Staged → Thumbnailed → Uploaded → Committed`, or `Failed` from
//! any state. The staging area is released on entry to either terminal state.

mod config;
mod errors;
mod pipeline;
mod retry;
mod store;
mod urls;

pub use config::PublishConfig;
pub use errors::{PersistenceError, PublishError, PublishStep};
pub use pipeline::{
    sanitize_file_name, PublishPipeline, PublishRun, PublishState, StagedVideo, UploadRequest,
};
pub use retry::RetryPolicy;
pub use store::VideoStore;
pub use urls::{cover_file_name, cover_key, public_object_url, video_key};
