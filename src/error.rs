use axum::{Json, extract::multipart::MultipartError, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use crate::imaging::ImagingError;

/// Reasons a file is rejected before it is moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File is too small")]
    TooSmall,

    #[error("File is too big")]
    TooBig,

    #[error("Filetype not allowed")]
    TypeNotAllowed,
}

/// Per-file upload failure. Recorded in the file's result, never fatal for
/// sibling files.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Not files found!")]
    NoFiles,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Sorry, could not open readstream.")]
    ReadStream(#[source] std::io::Error),

    #[error("Sorry, could not open writestream.")]
    WriteStream(#[source] std::io::Error),

    #[error("Sorry, upload was interrupted: {0}")]
    Interrupted(String),

    #[error("Sorry, could not move file.")]
    Move(#[source] std::io::Error),

    #[error("Sorry, could not process image.")]
    Imaging(#[from] ImagingError),
}

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Multipart error: {0}")]
    MultipartError(#[from] MultipartError),
}


/// Convert `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        // Map application errors to HTTP status codes and messages
        let (status, error_message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            AppError::MultipartError(err) => (err.status(), err.body_text()),
        };

        // Return standardized JSON error response
        let body = Json(json!({"error": error_message}));
        (status, body).into_response()
    }
}
