#![allow(dead_code)]

use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use fileuploader::{
    ImageTool, ImagingError, ThumbSize, Transform, UploadConfig, UploadOptions, UploadedFile,
};
use image::{ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

/// Upload sandbox: `public/files` for stored files, `tmp` for received ones.
pub struct Sandbox {
    pub root: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self { root: TempDir::new().unwrap() }
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.path().join("public")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.public_dir().join("files")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.path().join("tmp")
    }

    pub fn config(&self, options: UploadOptions) -> UploadConfig {
        UploadConfig::resolve(UploadOptions {
            tmp_dir: Some(self.tmp_dir().to_string_lossy().into_owned()),
            public_dir: Some(self.public_dir().to_string_lossy().into_owned()),
            upload_dir: Some(self.upload_dir().to_string_lossy().into_owned()),
            ..options
        })
        .unwrap()
    }

    /// Park `body` in the temp dir as if it had just been received.
    pub fn received(&self, name: &str, body: &[u8]) -> UploadedFile {
        std::fs::create_dir_all(self.tmp_dir()).unwrap();
        let path = self.tmp_dir().join(fileuploader::utils::temp_file_name(name));
        std::fs::write(&path, body).unwrap();
        UploadedFile {
            path,
            name: name.to_string(),
            size: body.len() as u64,
            content_type: "image/png".to_string(),
        }
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([30, 120, 200]));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Image tool that counts thumbnail calls and finishes them out of order.
#[derive(Default)]
pub struct CountingTool {
    pub thumbnails: AtomicUsize,
    pub transforms: AtomicUsize,
}

impl CountingTool {
    pub fn thumbnail_calls(&self) -> usize {
        self.thumbnails.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageTool for CountingTool {
    async fn transform(
        &self,
        data: Bytes,
        _format: ImageFormat,
        _ops: &[Transform],
        _quality: u8,
    ) -> Result<Bytes, ImagingError> {
        self.transforms.fetch_add(1, Ordering::SeqCst);
        Ok(data)
    }

    async fn thumbnail(
        &self,
        source: &Path,
        target: &Path,
        size: ThumbSize,
    ) -> Result<(), ImagingError> {
        // Smaller sizes finish later
        let delay = 200u64.saturating_sub(u64::from(size.width()));
        tokio::time::sleep(Duration::from_millis(delay)).await;
        tokio::fs::copy(source, target).await?;
        self.thumbnails.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
