use std::{io::ErrorKind, path::Path, sync::Arc};

use futures::future::join_all;
use tokio::fs;
use tracing::{debug, info};

use crate::{
    config::UploadConfig,
    directory::ensure_dir,
    imaging::{ImageTool, RustImageTool},
    models::{FileResult, UploadOutcome, UploadedFile},
    mover::move_file,
    thumbnail::create_thumbnails,
    validate::validate_file,
};

/// Runs received files through validation, the move into the upload
/// directory and thumbnail generation.
///
/// Cheap to clone; the configuration is shared read-only.
#[derive(Clone)]
pub struct Uploader {
    config: Arc<UploadConfig>,
    images: Arc<dyn ImageTool>,
}

impl Uploader {
    pub fn new(config: UploadConfig) -> Self {
        Self::with_image_tool(config, Arc::new(RustImageTool::new()))
    }

    pub fn with_image_tool(config: UploadConfig, images: Arc<dyn ImageTool>) -> Self {
        Self {
            config: Arc::new(config),
            images,
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    /// Process every file of a multipart request.
    ///
    /// Files run concurrently. The outcome is returned once all of them,
    /// thumbnails included, have finished, in the order they were received.
    pub async fn process_batch(&self, files: Vec<UploadedFile>) -> UploadOutcome {
        debug!("Start Uploader!");
        info!(total = files.len(), "Total received files");
        if files.is_empty() {
            return UploadOutcome::no_files();
        }
        ensure_dir(self.config.upload_path()).await;

        let results = join_all(files.iter().map(|file| self.process_file(file))).await;

        for result in &results {
            log_upload_info(result);
        }
        let uploaded = results.iter().filter(|r| r.success).count();
        info!(uploaded, total = results.len(), "Total uploaded files");

        UploadOutcome::Batch(results)
    }

    /// Process the single file of a direct stream upload.
    pub async fn process_single(&self, file: UploadedFile) -> UploadOutcome {
        debug!("Start Uploader!");
        ensure_dir(self.config.upload_path()).await;

        let result = self.process_file(&file).await;
        log_upload_info(&result);

        UploadOutcome::Single(result)
    }

    async fn process_file(&self, file: &UploadedFile) -> FileResult {
        let verdict = if self.config.validate {
            validate_file(file, &self.config)
        } else {
            Ok(())
        };

        let moved = move_file(
            file,
            &self.config.upload_dir,
            verdict,
            &self.config,
            self.images.as_ref(),
        )
        .await;

        create_thumbnails(moved, &self.config, self.images.as_ref()).await
    }

    /// Delete a stored file by name. Only the last path component of `name`
    /// is used. Returns `false` when no such file exists.
    pub async fn remove_file(&self, name: &str) -> std::io::Result<bool> {
        let Some(file_name) = Path::new(name).file_name() else {
            return Ok(false);
        };
        let path = self.config.upload_path().join(file_name);

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %path.display(), "File removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn log_upload_info(result: &FileResult) {
    if result.success {
        debug!(
            file = %result.original_name,
            destination_dir = %result.destination_dir,
            name = %result.name,
            "Upload: Completed"
        );
    } else {
        debug!(
            file = %result.original_name,
            error = result.error.as_deref().unwrap_or_default(),
            "Upload: Failed"
        );
    }
}
