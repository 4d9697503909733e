use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;

use shortvid_core::{status, ErrorMetadata, LogLevel};
use shortvid_storage::StorageError;
use thiserror::Error;

use crate::encoder::EncodeError;
use crate::extractor::ExtractionError;
use crate::staging::StagingError;

/// Steps that run under a timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStep {
    Extract,
    UploadVideo,
    UploadCover,
    Commit,
}

impl Display for PublishStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PublishStep::Extract => write!(f, "frame extraction"),
            PublishStep::UploadVideo => write!(f, "video upload"),
            PublishStep::UploadCover => write!(f, "cover upload"),
            PublishStep::Commit => write!(f, "metadata commit"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Database unavailable: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Other(String),
}

impl PersistenceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, PersistenceError::Connection(_))
    }
}

/// Terminal failure of a publish run.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Rejected before anything was staged.
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Staging failed: {0}")]
    Io(#[from] StagingError),

    #[error("Frame extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Cover encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Upload of {key} failed: {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Metadata commit failed: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("{step} timed out after {after:?}")]
    Timeout { step: PublishStep, after: Duration },
}

impl PublishError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Storage { source, .. } => source.is_retryable(),
            PublishError::Persistence(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// The commit failed in a way that does not say whether the row was written:
    /// the connection dropped or the step timed out mid-flight.
    pub fn commit_outcome_unknown(&self) -> bool {
        matches!(
            self,
            PublishError::Persistence(PersistenceError::Connection(_))
                | PublishError::Timeout {
                    step: PublishStep::Commit,
                    ..
                }
        )
    }
}

/// Static metadata for each variant: (envelope_status, error_code, log_level).
fn publish_error_static_metadata(err: &PublishError) -> (i32, &'static str, LogLevel) {
    match err {
        PublishError::InvalidUpload(_) => (status::INVALID_REQUEST, "INVALID_UPLOAD", LogLevel::Debug),
        PublishError::Io(_) => (status::STAGING_IO, "STAGING_IO_ERROR", LogLevel::Error),
        PublishError::Extraction(_) => (status::EXTRACTION, "EXTRACTION_ERROR", LogLevel::Warn),
        PublishError::Encode(_) => (status::ENCODE, "ENCODE_ERROR", LogLevel::Warn),
        PublishError::Storage { .. } => (status::STORAGE, "STORAGE_ERROR", LogLevel::Error),
        PublishError::Persistence(_) => (status::PERSISTENCE, "PERSISTENCE_ERROR", LogLevel::Error),
        PublishError::Timeout { .. } => (status::TIMEOUT, "TIMEOUT", LogLevel::Error),
    }
}

impl ErrorMetadata for PublishError {
    /// Pipeline failures are reported in the envelope, not the HTTP status.
    fn http_status_code(&self) -> u16 {
        200
    }

    fn envelope_status(&self) -> i32 {
        publish_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        publish_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        self.is_retryable() || matches!(self, PublishError::Timeout { .. })
    }

    fn client_message(&self) -> String {
        match self {
            PublishError::InvalidUpload(msg) => msg.clone(),
            PublishError::Io(_) => "video upload failed".to_string(),
            PublishError::Extraction(_) => "could not read a cover frame from the video".to_string(),
            PublishError::Encode(_) => "could not create the cover image".to_string(),
            PublishError::Storage { .. } => "failed to store the video".to_string(),
            PublishError::Persistence(_) => "failed to save the video".to_string(),
            PublishError::Timeout { .. } => "publishing timed out".to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        publish_error_static_metadata(self).2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn each_failure_kind_has_its_own_status() {
        let errors = [
            PublishError::InvalidUpload("file extension not allowed".into()),
            PublishError::Io(StagingError::InvalidFileName("x".into())),
            PublishError::Extraction(ExtractionError::OffsetBeyondDuration { offset: 10.0 }),
            PublishError::Encode(EncodeError::Decode("garbage".into())),
            PublishError::Storage {
                key: "42/clip.mp4".into(),
                source: StorageError::Unavailable("reset".into()),
            },
            PublishError::Persistence(PersistenceError::Connection("refused".into())),
            PublishError::Timeout {
                step: PublishStep::Extract,
                after: Duration::from_secs(60),
            },
        ];
        let codes: Vec<i32> = errors.iter().map(|e| e.envelope_status()).collect();
        assert_eq!(codes, vec![1, 10, 11, 12, 13, 14, 15]);
        assert!(errors.iter().all(|e| e.http_status_code() == 200));
    }

    #[test]
    fn client_messages_do_not_leak_internals() {
        let err = PublishError::Extraction(ExtractionError::Unreadable(PathBuf::from(
            "/var/tmp/shortvid-staging/42/run/clip.mp4",
        )));
        assert!(!err.client_message().contains("/var/tmp"));

        let err = PublishError::Storage {
            key: "42/clip.mp4".into(),
            source: StorageError::Unavailable("AccessDenied for AKIA...".into()),
        };
        assert!(!err.client_message().contains("AKIA"));
        assert!(!err.client_message().contains("42/clip.mp4"));
    }

    #[test]
    fn only_transient_storage_and_persistence_errors_retry() {
        assert!(PublishError::Storage {
            key: "k".into(),
            source: StorageError::Unavailable("reset".into()),
        }
        .is_retryable());
        assert!(!PublishError::Storage {
            key: "k".into(),
            source: StorageError::InvalidKey("k".into()),
        }
        .is_retryable());
        assert!(PublishError::Persistence(PersistenceError::Connection("refused".into())).is_retryable());
        assert!(!PublishError::Persistence(PersistenceError::Constraint("dup".into())).is_retryable());
        assert!(!PublishError::Timeout {
            step: PublishStep::Commit,
            after: Duration::from_secs(10)
        }
        .is_retryable());
    }

    #[test]
    fn dropped_connections_and_commit_timeouts_leave_outcome_unknown() {
        assert!(PublishError::Persistence(PersistenceError::Connection("reset".into()))
            .commit_outcome_unknown());
        assert!(PublishError::Timeout {
            step: PublishStep::Commit,
            after: Duration::from_secs(10)
        }
        .commit_outcome_unknown());
        assert!(!PublishError::Persistence(PersistenceError::Constraint("dup".into()))
            .commit_outcome_unknown());
        assert!(!PublishError::Timeout {
            step: PublishStep::UploadCover,
            after: Duration::from_secs(10)
        }
        .commit_outcome_unknown());
    }
}
