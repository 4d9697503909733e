//! Shortvid Processing Library
//!
//! The media publish pipeline: stage an uploaded video on local disk, pull a
//! cover frame with ffmpeg, re-encode it as JPEG, upload both files to object
//! storage and commit the video record.

pub mod encoder;
pub mod extractor;
pub mod publish;
pub mod staging;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use encoder::{CoverEncoder, EncodeError};
pub use extractor::{ExtractionError, FfmpegFrameExtractor, FrameExtractor};
pub use publish::{
    public_object_url, PersistenceError, PublishConfig, PublishError, PublishPipeline, PublishRun,
    PublishState, PublishStep, StagedVideo, UploadRequest, VideoStore,
};
pub use staging::{StagingArea, StagingError, StagingStore};
