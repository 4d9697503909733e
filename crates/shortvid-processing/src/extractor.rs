//! Cover frame extraction

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Video file is not readable: {0}")]
    Unreadable(PathBuf),

    #[error("Invalid frame offset: {0}")]
    InvalidOffset(f64),

    #[error("Invalid ffmpeg path: {0}")]
    InvalidBinary(String),

    #[error("Failed to execute ffmpeg: {0}")]
    Spawn(#[source] io::Error),

    #[error("ffmpeg exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    /// ffmpeg succeeded but produced no frame, which is what happens when
    /// seeking past the end of the video.
    #[error("Offset {offset}s is beyond the video duration")]
    OffsetBeyondDuration { offset: f64 },
}

/// Pulls a single decoded frame out of a video.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Return the raw encoded frame (PNG for ffmpeg) at `offset_seconds`.
    async fn extract_frame(
        &self,
        video_path: &Path,
        offset_seconds: f64,
    ) -> Result<Vec<u8>, ExtractionError>;
}

/// Validate that a binary path doesn't contain shell metacharacters
fn validate_binary_path(path: &str) -> Result<(), ExtractionError> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.trim().is_empty() || path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(ExtractionError::InvalidBinary(path.to_string()));
    }
    Ok(())
}

/// [`FrameExtractor`] backed by the ffmpeg binary.
#[derive(Clone, Debug)]
pub struct FfmpegFrameExtractor {
    ffmpeg_path: String,
}

impl FfmpegFrameExtractor {
    pub fn new(ffmpeg_path: impl Into<String>) -> Result<Self, ExtractionError> {
        let ffmpeg_path = ffmpeg_path.into();
        validate_binary_path(&ffmpeg_path)?;
        Ok(Self { ffmpeg_path })
    }

    fn args(video_path: &Path, offset_seconds: f64) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-ss".to_string(),
            format!("{:.3}", offset_seconds),
            "-i".to_string(),
            video_path.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-f".to_string(),
            "image2pipe".to_string(),
            "-vcodec".to_string(),
            "png".to_string(),
            "-".to_string(),
        ]
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn extract_frame(
        &self,
        video_path: &Path,
        offset_seconds: f64,
    ) -> Result<Vec<u8>, ExtractionError> {
        if !offset_seconds.is_finite() || offset_seconds < 0.0 {
            return Err(ExtractionError::InvalidOffset(offset_seconds));
        }

        match tokio::fs::metadata(video_path).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(ExtractionError::Unreadable(video_path.to_path_buf())),
        }

        let start = std::time::Instant::now();

        // kill_on_drop: a timed-out extraction must not leave ffmpeg running.
        let output = Command::new(&self.ffmpeg_path)
            .args(Self::args(video_path, offset_seconds))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(ExtractionError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(
                status = %output.status,
                stderr = %stderr,
                path = %video_path.display(),
                "ffmpeg frame extraction failed"
            );
            return Err(ExtractionError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        if output.stdout.is_empty() {
            return Err(ExtractionError::OffsetBeyondDuration {
                offset: offset_seconds,
            });
        }

        tracing::debug!(
            path = %video_path.display(),
            offset_seconds,
            size_bytes = output.stdout.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Extracted cover frame"
        );

        Ok(output.stdout)
    }
}
