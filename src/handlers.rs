use axum::{
    Json,
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{Method, StatusCode, header},
    middleware::Next,
    response::{Html, Response},
};
use tracing::{error, info};

use crate::{
    error::AppError,
    models::{FileResult, UploadOutcome, flatten_fields},
    receiver::{is_multipart, is_xhr, receive_multipart, receive_stream, stream_file},
    state::AppState,
};

/// Accept an upload.
///
/// Multipart bodies may carry any number of files. XHR requests with a raw
/// body upload one file described by `X-File-Name` / `X-File-Size`.
/// Anything else reports that no files were found.
pub async fn upload_file(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<UploadOutcome>, AppError> {
    let uploader = &state.uploader;
    let config = uploader.config();

    // Form upload: any number of files, one result each
    if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        // Stream every file part into the temp dir before processing
        let fields = receive_multipart(multipart, config).await?;
        let outcome = uploader.process_batch(flatten_fields(fields)).await;
        info!(uploaded = outcome.uploaded(), "Uploader closed!");
        return Ok(Json(outcome));
    }

    // Direct upload: the raw body is the file
    if is_xhr(request.headers()) {
        let mut file = stream_file(request.headers(), config)?;

        // Enforce maximum post size from the declared length
        if file.size > config.max_post_size {
            error!(
                "File size {} exceeds maximum post size of {} bytes",
                file.size, config.max_post_size
            );
            return Err(AppError::PayloadTooLarge(format!(
                "File size {} exceeds maximum post size of {} bytes",
                file.size, config.max_post_size
            )));
        }

        // Write the body to the temp file, then validate and move it
        let body = request.into_body().into_data_stream();
        let outcome = match receive_stream(&mut file, body, config).await {
            Ok(()) => uploader.process_single(file).await,
            Err(e) => {
                error!(file = %file.name, error = %e, "Direct upload failed");
                UploadOutcome::Single(FileResult::new(&file, &config.upload_dir).fail(&e))
            }
        };
        info!(uploaded = outcome.uploaded(), "Uploader closed!");
        return Ok(Json(outcome));
    }

    // Neither form nor direct upload
    Ok(Json(UploadOutcome::no_files()))
}

/// Delete a stored file by name.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, AppError> {
    // Resolved by basename inside the upload dir
    let removed = state.uploader.remove_file(&name).await.map_err(|e| {
        error!("Failed to delete file {}: {}", name, e);
        AppError::InternalServerError("Failed to delete file".to_string())
    })?;

    if !removed {
        return Err(AppError::NotFound(format!("File {} not found", name)));
    }

    // 204 No Content indicates successful deletion with no response body
    Ok(StatusCode::NO_CONTENT)
}

/// Force a download for stored files that should not render inline.
///
/// Wraps static file serving; names matching `inline_file_types` (images by
/// default) are left alone.
pub async fn download_headers(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    // Last path segment is the stored file name
    let is_get = request.method() == Method::GET;
    let name = request
        .uri()
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let mut response = next.run(request).await;
    if is_get && response.status().is_success() && !state.uploader.config().is_inline(&name) {
        // Set Content-Disposition header to force download
        response.headers_mut().insert(
            header::CONTENT_DISPOSITION,
            header::HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name))
                .unwrap_or_else(|_| header::HeaderValue::from_static("attachment")),
        );
    }
    response
}

/// Minimal HTML form for manual testing.
pub async fn upload_form() -> Html<&'static str> {
    Html(
        r#"<form action="/upload" method="post" enctype="multipart/form-data">
<input type="file" name="upload-file" multiple="true">
<input type="submit" value="Upload">
</form>"#,
    )
}

pub async fn health_check() -> &'static str {
    "OK"
}
