//! error taxonomy and its mapping onto HTTP responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

/// failures talking to the time-series store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("store rejected request with status {status}")]
    Rejected { status: u16, body: String },

    #[error("malformed store response: {0}")]
    MalformedResponse(String),

    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),
}

/// everything a route handler can fail with
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RelayError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let message = match &self {
            RelayError::BadRequest(msg) => msg.clone(),
            // driver text can carry urls and store internals
            RelayError::Storage(e) => {
                tracing::error!(error = %e, "storage operation failed");
                if let StorageError::Rejected { body, .. } = e {
                    tracing::debug!(%body, "store response body");
                }
                "storage unavailable".to_string()
            }
        };
        (self.status(), Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
