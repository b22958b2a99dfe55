//! HTTP error responses.
//!
//! Every failure is a JSON body `{"error": <message>, "code": <CODE>}` with a
//! non-2xx status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use beam_core::errors::RelayError;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

/// The request had no `file` field.
pub const NO_FILE: &str = "NO_FILE";
/// The multipart stream could not be read.
pub const UPLOAD_FAILED: &str = "UPLOAD_FAILED";
/// The request body exceeded the upload limit.
pub const BODY_TOO_LARGE: &str = "PAYLOAD_TOO_LARGE";

/// Errors returned by HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No `file` field in the multipart body.
    #[error("No file uploaded")]
    NoFile,

    /// The relay rejected the submission.
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// The body exceeded the upload limit before it reached the relay.
    #[error("upload exceeds the {limit}-byte limit")]
    BodyTooLarge {
        /// Configured body limit in bytes.
        limit: usize,
    },

    /// The multipart stream was unreadable.
    #[error("Upload failed")]
    Upload(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoFile => StatusCode::BAD_REQUEST,
            Self::Relay(err) => match err {
                RelayError::Validation { .. } | RelayError::Codec(_) => StatusCode::BAD_REQUEST,
                RelayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                RelayError::DuplicateConnection(_) => StatusCode::CONFLICT,
            },
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Upload(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoFile => NO_FILE,
            Self::Relay(err) => err.code(),
            Self::BodyTooLarge { .. } => BODY_TOO_LARGE,
            Self::Upload(_) => UPLOAD_FAILED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Upload(detail) = &self {
            warn!(error = %detail, "upload stream failed");
        }
        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status(), Json(body)).into_response()
    }
}
