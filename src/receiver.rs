//! Turns incoming requests into temp files.
//!
//! Multipart requests can carry any number of files; each file part is
//! streamed into the temp directory and grouped by its form field. XHR
//! uploads send one file as the raw request body, described by the
//! `X-File-Name` and `X-File-Size` headers.

use std::path::PathBuf;

use axum::{
    extract::Multipart,
    http::{HeaderMap, header},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::{
    config::UploadConfig,
    directory::ensure_dir,
    error::{AppError, UploadError},
    models::{FileField, UploadedFile},
    utils::{content_type_or_default, temp_file_name},
};

pub const FILE_NAME_HEADER: &str = "x-file-name";
pub const FILE_SIZE_HEADER: &str = "x-file-size";

pub fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
}

pub fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"))
}

/// Stream every file part of `multipart` into the temp directory.
///
/// Fields come back in the order they were first seen. If the body fails
/// part-way, temp files already written are removed.
pub async fn receive_multipart(
    multipart: Multipart,
    config: &UploadConfig,
) -> Result<Vec<(String, FileField)>, AppError> {
    ensure_dir(config.tmp_path()).await;

    let mut written = Vec::new();
    let received = receive_fields(multipart, config, &mut written).await;
    if received.is_err() {
        for path in written {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove temp file");
            }
        }
    }
    received
}

async fn receive_fields(
    mut multipart: Multipart,
    config: &UploadConfig,
    written: &mut Vec<PathBuf>,
) -> Result<Vec<(String, FileField)>, AppError> {
    let mut fields = Vec::new();

    while let Some(mut field) = multipart.next_field().await? {
        // Browsers send an empty part for an untouched file input
        let Some(original_name) = field.file_name().filter(|n| !n.is_empty()).map(str::to_string)
        else {
            continue;
        };
        let field_name = field.name().unwrap_or("file").to_string();
        let content_type = content_type_or_default(field.content_type());

        let path = config.tmp_path().join(temp_file_name(&original_name));
        let mut out = File::create(&path).await.map_err(|e| {
            AppError::InternalServerError(format!("Could not open temp file: {}", e))
        })?;
        written.push(path.clone());

        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await? {
            out.write_all(&chunk).await.map_err(|e| {
                AppError::InternalServerError(format!("Could not write temp file: {}", e))
            })?;
            size += chunk.len() as u64;
        }
        out.flush().await.map_err(|e| {
            AppError::InternalServerError(format!("Could not write temp file: {}", e))
        })?;

        debug!(field = %field_name, file = %original_name, size, "Received file part");
        insert_field(
            &mut fields,
            &field_name,
            UploadedFile { path, name: original_name, size, content_type },
        );
    }

    Ok(fields)
}

#[derive(Debug, PartialEq, Eq)]
enum Slot {
    Plain,
    Append,
    Key(String),
}

/// Split `photos[]` / `photos[front]` / `photos` into base name and slot.
fn parse_field_name(raw: &str) -> (String, Slot) {
    if let Some(base) = raw.strip_suffix("[]") {
        return (base.to_string(), Slot::Append);
    }
    if let Some(open) = raw.find('[') {
        if open > 0 && raw.ends_with(']') {
            return (raw[..open].to_string(), Slot::Key(raw[open + 1..raw.len() - 1].to_string()));
        }
    }
    (raw.to_string(), Slot::Plain)
}

fn insert_field(fields: &mut Vec<(String, FileField)>, raw_name: &str, file: UploadedFile) {
    let (name, slot) = parse_field_name(raw_name);

    let incoming = match slot {
        Slot::Key(key) => FileField::Nested(vec![(key, file)]),
        Slot::Append => FileField::List(vec![FileField::Single(file)]),
        Slot::Plain => FileField::Single(file),
    };

    match fields.iter_mut().find(|(existing, _)| *existing == name) {
        Some((_, existing)) => merge(existing, incoming),
        None => fields.push((name, incoming)),
    }
}

fn merge(existing: &mut FileField, incoming: FileField) {
    match (existing, incoming) {
        (FileField::List(items), FileField::List(more)) => items.extend(more),
        (FileField::List(items), incoming) => items.push(incoming),
        (FileField::Nested(entries), FileField::Nested(more)) => entries.extend(more),
        (existing, incoming) => {
            let previous = std::mem::replace(existing, FileField::List(Vec::new()));
            let incoming = match incoming {
                FileField::List(items) => items,
                other => vec![other],
            };
            let mut items = vec![previous];
            items.extend(incoming);
            *existing = FileField::List(items);
        }
    }
}

/// Describe a direct stream upload from its headers.
///
/// The temp path is chosen here; the body is written by [`receive_stream`].
pub fn stream_file(headers: &HeaderMap, config: &UploadConfig) -> Result<UploadedFile, AppError> {
    // Browsers send the raw UTF-8 name, which `to_str` rejects
    let name = headers
        .get(FILE_NAME_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing X-File-Name header".into()))?;

    let size = headers
        .get(FILE_SIZE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);

    let content_type = content_type_or_default(
        headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
    );

    Ok(UploadedFile {
        path: config.tmp_path().join(temp_file_name(&name)),
        name,
        size,
        content_type,
    })
}

/// Write the request body into `file.path`.
///
/// A zero declared size is replaced with the number of bytes received. On
/// failure the partial temp file is removed.
pub async fn receive_stream<S, E>(
    file: &mut UploadedFile,
    body: S,
    config: &UploadConfig,
) -> Result<(), UploadError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    ensure_dir(config.tmp_path()).await;

    let mut out = File::create(&file.path).await.map_err(|e| {
        warn!(path = %file.path.display(), error = %e, "Could not open writestream");
        UploadError::WriteStream(e)
    })?;
    debug!(path = %file.path.display(), "Stream open");

    let mut body = std::pin::pin!(body);
    let mut written = 0u64;
    let copied: Result<(), UploadError> = async {
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| UploadError::Interrupted(e.to_string()))?;
            out.write_all(&chunk).await.map_err(UploadError::Move)?;
            written += chunk.len() as u64;
        }
        out.flush().await.map_err(UploadError::Move)
    }
    .await;

    if let Err(e) = copied {
        drop(out);
        if let Err(rm) = tokio::fs::remove_file(&file.path).await {
            warn!(path = %file.path.display(), error = %rm, "Failed to remove temp file");
        }
        return Err(e);
    }

    if file.size == 0 {
        file.size = written;
    }
    debug!(file = %file.name, written, "Stream closed");
    Ok(())
}
