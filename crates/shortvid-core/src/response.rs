//! Wire envelopes
//!
//! Every response carries `status_code` (0 on success) and a message under the
//! key `messgae`. The misspelling is kept for compatibility with existing clients.

use serde::{Deserialize, Serialize};

use crate::error::{status, ErrorMetadata};
use crate::models::UserResponse;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status_code: i32,
    #[serde(rename = "messgae")]
    pub message: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status_code: status::OK,
            message: String::new(),
        }
    }

    pub fn error(status_code: i32, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }

    /// Envelope for an error, using only its stable client-facing message.
    pub fn from_error<E: ErrorMetadata + ?Sized>(err: &E) -> Self {
        Self::error(err.envelope_status(), err.client_message())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserListResponse {
    #[serde(flatten)]
    pub status: StatusResponse,
    pub user_list: Vec<UserResponse>,
}

impl UserListResponse {
    pub fn ok(user_list: Vec<UserResponse>) -> Self {
        Self {
            status: StatusResponse::ok(),
            user_list,
        }
    }
}
