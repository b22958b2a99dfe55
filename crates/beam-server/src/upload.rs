//! `POST /upload`: multipart file upload bridged into a broadcast.
//!
//! The body carries a single file field named `file`. Its bytes are handed to
//! the relay as a raw payload with no originating connection, so the
//! resulting `file-shared` envelope has no `sender`. On success the response
//! is `{"success": true, "fileData": <envelope>}`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::multipart::{Multipart, MultipartError, MultipartRejection};
use axum::http::StatusCode;
use metrics::counter;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::errors::ApiError;
use crate::metrics::UPLOADS_TOTAL;
use crate::server::AppState;

/// Multipart field holding the file.
pub const FILE_FIELD: &str = "file";

struct UploadedFile {
    name: String,
    mime_type: String,
    bytes: Bytes,
}

/// POST /upload
pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut multipart = multipart.map_err(|e| {
        debug!(error = %e, "upload is not a multipart request");
        ApiError::NoFile
    })?;
    let limit = state.config.max_upload_bytes;
    let file = read_file_field(&mut multipart, limit).await?;

    // Encoding a large payload is CPU-bound; keep it off the reactor.
    let relay = state.relay.clone();
    let broadcast = tokio::task::spawn_blocking(move || {
        relay.submit_file(&file.bytes, &file.name, &file.mime_type)
    })
    .await
    .map_err(|e| ApiError::Upload(e.to_string()))??;

    counter!(UPLOADS_TOTAL).increment(1);
    if let Some(file) = broadcast.envelope.as_file() {
        info!(
            envelope_id = %file.id(),
            name = file.name(),
            size = file.size_bytes(),
            recipients = broadcast.report.attempted,
            "file uploaded"
        );
    }
    Ok(Json(json!({
        "success": true,
        "fileData": broadcast.envelope,
    })))
}

/// Skip to the first `file` field carrying a file name and read it whole.
async fn read_file_field(multipart: &mut Multipart, limit: usize) -> Result<UploadedFile, ApiError> {
    loop {
        let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(&e, limit))?
        else {
            return Err(ApiError::NoFile);
        };
        if field.name() != Some(FILE_FIELD) || field.file_name().is_none() {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_owned();
        let mime_type = field.content_type().unwrap_or_default().to_owned();
        let bytes = field.bytes().await.map_err(|e| multipart_error(&e, limit))?;
        return Ok(UploadedFile {
            name,
            mime_type,
            bytes,
        });
    }
}

fn multipart_error(err: &MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::BodyTooLarge { limit }
    } else {
        ApiError::Upload(err.body_text())
    }
}
