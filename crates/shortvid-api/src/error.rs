//! HTTP error response conversion
//!
//! Handlers return `Result<_, HttpAppError>`. Both `AppError` and the pipeline's
//! `PublishError` render as a [`StatusResponse`] envelope carrying only the
//! stable client message; the full error chain goes to the log.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use shortvid_core::{AppError, ErrorMetadata, LogLevel, StatusResponse};
use shortvid_processing::PublishError;

/// Wrapper so `IntoResponse` can be implemented for errors owned by other crates.
#[derive(Debug)]
pub enum HttpAppError {
    App(AppError),
    Publish(PublishError),
}

impl From<AppError> for HttpAppError {
    fn from(err: AppError) -> Self {
        HttpAppError::App(err)
    }
}

impl From<PublishError> for HttpAppError {
    fn from(err: PublishError) -> Self {
        HttpAppError::Publish(err)
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        HttpAppError::App(AppError::from(err))
    }
}

impl From<QueryRejection> for HttpAppError {
    fn from(rejection: QueryRejection) -> Self {
        HttpAppError::App(AppError::InvalidInput(format!(
            "Invalid query parameters: {}",
            rejection.body_text()
        )))
    }
}

impl HttpAppError {
    fn metadata(&self) -> &dyn ErrorMetadata {
        match self {
            HttpAppError::App(e) => e,
            HttpAppError::Publish(e) => e,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            HttpAppError::App(e) => e.error_type(),
            HttpAppError::Publish(_) => "Publish",
        }
    }

    fn detailed_message(&self) -> String {
        use std::error::Error;

        match self {
            HttpAppError::App(e) => e.detailed_message(),
            HttpAppError::Publish(e) => {
                let mut details = e.to_string();
                let mut source = e.source();
                while let Some(err) = source {
                    details.push_str(&format!("\n  Caused by: {}", err));
                    source = err.source();
                }
                details
            }
        }
    }
}

fn log_error(error: &HttpAppError) {
    let meta = error.metadata();
    let error_type = error.error_type();
    let error_code = meta.error_code();
    let details = error.detailed_message();
    match meta.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %details, error_type, error_code, "Request failed");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %details, error_type, error_code, "Request failed");
        }
        LogLevel::Error => {
            tracing::error!(error = %details, error_type, error_code, "Request failed");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        log_error(&self);

        let meta = self.metadata();
        let status =
            StatusCode::from_u16(meta.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(StatusResponse::from_error(meta))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use shortvid_core::status;
    use shortvid_processing::{PersistenceError, PublishStep};
    use std::time::Duration;

    async fn render(err: HttpAppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn publish_errors_are_http_ok_with_envelope() {
        let (status, body) = render(
            PublishError::Persistence(PersistenceError::Connection(
                "connection refused on 10.0.0.3:5432".to_string(),
            ))
            .into(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status_code"], status::PERSISTENCE);
        assert_eq!(body["messgae"], "failed to save the video");
    }

    #[tokio::test]
    async fn timeout_message_does_not_leak_details() {
        let (_, body) = render(
            PublishError::Timeout {
                step: PublishStep::UploadVideo,
                after: Duration::from_secs(120),
            }
            .into(),
        )
        .await;

        assert_eq!(body["status_code"], status::TIMEOUT);
        assert_eq!(body["messgae"], "publishing timed out");
    }

    #[tokio::test]
    async fn unauthorized_uses_http_401() {
        let (status, body) =
            render(AppError::Unauthorized("Token has expired".to_string()).into()).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status_code"], status::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn internal_errors_hide_source() {
        let (status, body) =
            render(anyhow::anyhow!("pool exhausted at db-primary").into()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status_code"], status::INTERNAL);
        assert!(!body["messgae"].as_str().unwrap().contains("db-primary"));
    }
}
