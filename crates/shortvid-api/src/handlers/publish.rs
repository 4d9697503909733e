//! `POST /douyin/publish/action/`
//!
//! Multipart form with a required `data` file field and an optional `title`
//! text field, in either order. The video is streamed straight into the run's
//! staging area; the run is driven to completion once the form is exhausted.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;
use std::sync::Arc;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use futures::TryStreamExt;
use shortvid_core::StatusResponse;
use shortvid_processing::{PublishError, StagedVideo, StagingError};
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;

use crate::auth::CurrentUser;
use crate::error::HttpAppError;
use crate::state::AppState;

/// The request body was cut off by the route's body limit.
#[derive(Debug)]
struct BodyLimitReached;

impl Display for BodyLimitReached {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "request body limit reached")
    }
}

impl Error for BodyLimitReached {}

fn cut_by_body_limit(err: &MultipartError) -> bool {
    err.status() == StatusCode::PAYLOAD_TOO_LARGE
}

/// Field read errors as seen by the staging writer.
fn field_read_error(err: MultipartError) -> io::Error {
    if cut_by_body_limit(&err) {
        io::Error::other(BodyLimitReached)
    } else {
        io::Error::other(err)
    }
}

/// Whether staging failed because the body limit cut the upload short.
fn staging_hit_body_limit(err: &PublishError) -> bool {
    match err {
        PublishError::Io(StagingError::Write { source, .. }) => source
            .get_ref()
            .is_some_and(|inner| inner.is::<BodyLimitReached>()),
        _ => false,
    }
}

fn too_large(max_size: u64) -> PublishError {
    PublishError::InvalidUpload(format!(
        "video exceeds the maximum size of {} MB",
        max_size / 1024 / 1024
    ))
}

/// Fail the request, releasing the staging area if a video was already staged.
async fn reject(staged: Option<StagedVideo>, err: PublishError) -> HttpAppError {
    match staged {
        Some(staged) => staged.abort(err).await.into(),
        None => err.into(),
    }
}

pub async fn publish_video(
    State(state): State<Arc<AppState>>,
    CurrentUser(author_id): CurrentUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<StatusResponse>, HttpAppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Rejected non-multipart publish request");
        PublishError::InvalidUpload("expected a multipart form".to_string())
    })?;

    let pipeline = &state.publisher.pipeline;
    let max_size = state.publisher.max_video_size_bytes as u64;

    let mut title: Option<String> = None;
    let mut staged: Option<StagedVideo> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) if cut_by_body_limit(&e) => {
                return Err(reject(staged, too_large(max_size)).await);
            }
            Err(e) => {
                tracing::debug!(error = %e, author_id, "Malformed multipart body");
                return Err(reject(
                    staged,
                    PublishError::InvalidUpload("malformed multipart body".to_string()),
                )
                .await);
            }
        };

        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("title") => match field.text().await {
                Ok(text) => title = Some(text),
                Err(e) if cut_by_body_limit(&e) => {
                    return Err(reject(staged, too_large(max_size)).await);
                }
                Err(e) => {
                    tracing::debug!(error = %e, author_id, "Unreadable title field");
                    return Err(reject(
                        staged,
                        PublishError::InvalidUpload("malformed multipart body".to_string()),
                    )
                    .await);
                }
            },
            Some("data") => {
                if let Some(previous) = staged.take() {
                    return Err(previous
                        .abort(PublishError::InvalidUpload(
                            "only one video may be uploaded per request".to_string(),
                        ))
                        .await
                        .into());
                }

                let file_name = field.file_name().unwrap_or_default().to_string();
                let run = pipeline.begin(author_id, &file_name).await?;

                // One byte past the limit is enough to tell the upload is too large.
                let reader =
                    StreamReader::new(Box::pin(field.map_err(field_read_error))).take(max_size + 1);
                let video = match run.stage(reader).await {
                    Ok(video) => video,
                    Err(e) if staging_hit_body_limit(&e) => return Err(too_large(max_size).into()),
                    Err(e) => return Err(e.into()),
                };

                if video.size_bytes() > max_size {
                    return Err(video.abort(too_large(max_size)).await.into());
                }
                staged = Some(video);
            }
            // Unknown fields (e.g. a form-encoded token) are ignored.
            _ => {}
        }
    }

    let Some(staged) = staged else {
        return Err(
            PublishError::InvalidUpload("missing video file in field 'data'".to_string()).into(),
        );
    };

    let video = staged.publish(title).await?;
    tracing::info!(
        author_id,
        video_id = video.id,
        play_url = %video.play_url,
        "Video published"
    );

    Ok(Json(StatusResponse::ok()))
}
