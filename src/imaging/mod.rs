//! Image transforms used while moving files and generating thumbnails.
//!
//! The uploader only talks to the [`ImageTool`] trait. The production
//! implementation is [`RustImageTool`], backed by the `image` crate; tests
//! swap in a recording fake.

mod rust_backend;

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use image::ImageFormat;
use thiserror::Error;

use crate::config::{CropRect, ThumbSize};

pub use rust_backend::RustImageTool;

/// Quality used for every generated thumbnail.
pub const THUMBNAIL_QUALITY: u8 = 100;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// One step of the transform applied to an image before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transform {
    Crop(CropRect),
    /// `Box` sizes fit inside the box keeping aspect ratio, `Width` sizes
    /// scale to the width.
    Resize(ThumbSize),
}

#[async_trait]
pub trait ImageTool: Send + Sync {
    /// Decode `data`, apply `ops` in order and re-encode in the same format.
    async fn transform(
        &self,
        data: Bytes,
        format: ImageFormat,
        ops: &[Transform],
        quality: u8,
    ) -> Result<Bytes, ImagingError>;

    /// Write a thumbnail of `source` to `target`.
    async fn thumbnail(
        &self,
        source: &Path,
        target: &Path,
        size: ThumbSize,
    ) -> Result<(), ImagingError>;
}

/// Guess the image format from a file name's extension.
pub fn format_for_name(name: &str) -> Result<ImageFormat, ImagingError> {
    ImageFormat::from_path(name).map_err(|_| ImagingError::UnsupportedFormat(name.to_string()))
}
