use std::path::Path;

use bytes::Bytes;
use tokio::{
    fs::{self, File},
    io::{self, AsyncReadExt, AsyncWriteExt},
};
use tracing::{debug, error, warn};

use crate::{
    config::UploadConfig,
    error::{UploadError, ValidationError},
    imaging::{self, ImageTool, Transform},
    models::{FileResult, UploadedFile},
    naming,
};

/// Move a received file into `dest_dir`.
///
/// Rejected files are only cleaned up. Accepted files are copied (or run
/// through the image transform) to their resolved name, then the temp file
/// is removed.
pub async fn move_file(
    file: &UploadedFile,
    dest_dir: &str,
    verdict: Result<(), ValidationError>,
    config: &UploadConfig,
    images: &dyn ImageTool,
) -> FileResult {
    // Resolve the stored name up front so failures still report it
    let mut result = FileResult::new(file, dest_dir);
    result.name = destination_name(file, dest_dir, config).await;
    result.url = format!("{}{}", config.upload_url, result.name);

    if let Err(reason) = verdict {
        debug!(file = %file.name, %reason, "Rejecting file");
        remove_temp(&file.path).await;
        return result.fail(&reason.into());
    }

    // Copy or transform into place; the temp file goes away either way
    let target = Path::new(dest_dir).join(&result.name);
    let moved = transfer(&file.path, &target, &file.name, config, images).await;
    remove_temp(&file.path).await;

    match moved {
        Ok(()) => result.succeed(),
        Err(e) => {
            error!(file = %file.name, target = %target.display(), error = ?e, "moveFile failed");
            result.fail(&e)
        }
    }
}

async fn destination_name(file: &UploadedFile, dest_dir: &str, config: &UploadConfig) -> String {
    if config.safe_name {
        if let Some(name) = naming::safe_name(Path::new(dest_dir), &file.name).await {
            return name;
        }
    }
    file.path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| crate::utils::temp_file_name(&file.name))
}

async fn transfer(
    source: &Path,
    target: &Path,
    original_name: &str,
    config: &UploadConfig,
    images: &dyn ImageTool,
) -> Result<(), UploadError> {
    // Open both ends before touching any bytes
    let mut input = File::open(source).await.map_err(UploadError::ReadStream)?;
    let mut output = File::create(target).await.map_err(UploadError::WriteStream)?;

    // Images are re-encoded when resize or crop is on; everything else is copied as is
    let written = if config.is_image(original_name) && (config.resize || config.crop) {
        transform_into(&mut input, &mut output, original_name, config, images).await
    } else {
        match io::copy(&mut input, &mut output).await {
            Ok(_) => output.flush().await.map_err(UploadError::Move),
            Err(e) => Err(UploadError::Move(e)),
        }
    };

    // Never leave a half-written destination behind
    if written.is_err() {
        drop(output);
        if let Err(e) = fs::remove_file(target).await {
            warn!(target = %target.display(), error = %e, "Failed to remove partial file");
        }
    }
    written
}

async fn transform_into(
    input: &mut File,
    output: &mut File,
    original_name: &str,
    config: &UploadConfig,
    images: &dyn ImageTool,
) -> Result<(), UploadError> {
    let format = imaging::format_for_name(original_name)?;

    // Crop first, then resize the cropped region
    let mut ops = Vec::with_capacity(2);
    if config.crop {
        ops.push(Transform::Crop(config.coordinates));
    }
    if config.resize {
        ops.push(Transform::Resize(config.new_size));
    }
    debug!(file = original_name, ?ops, quality = config.quality, "Transform image");

    let mut data = Vec::new();
    input.read_to_end(&mut data).await.map_err(UploadError::Move)?;
    let transformed = images
        .transform(Bytes::from(data), format, &ops, config.quality)
        .await?;

    output.write_all(&transformed).await.map_err(UploadError::Move)?;
    output.flush().await.map_err(UploadError::Move)
}

async fn remove_temp(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => {}
        // Already gone, e.g. a read-stream failure on a missing temp file
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove temp file"),
    }
}
