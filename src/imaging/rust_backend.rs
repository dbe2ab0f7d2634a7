use std::{io::Cursor, path::Path};

use async_trait::async_trait;
use bytes::Bytes;
use image::{
    DynamicImage, ImageFormat, ImageReader, codecs::jpeg::JpegEncoder, imageops::FilterType,
};

use super::{ImageTool, ImagingError, THUMBNAIL_QUALITY, Transform};
use crate::config::ThumbSize;

/// [`ImageTool`] backed by the `image` crate.
///
/// Decoding and encoding are CPU bound, so every call runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct RustImageTool;

impl RustImageTool {
    pub fn new() -> Self {
        Self
    }
}

fn resize(img: DynamicImage, size: ThumbSize) -> DynamicImage {
    match size {
        ThumbSize::Box { width, height } => img.resize(width, height, FilterType::Lanczos3),
        ThumbSize::Width(width) => {
            let height = scaled_height(img.width(), img.height(), width);
            img.resize_exact(width, height, FilterType::Lanczos3)
        }
    }
}

/// Height that keeps the aspect ratio when scaling `orig_width` to `width`.
fn scaled_height(orig_width: u32, orig_height: u32, width: u32) -> u32 {
    if orig_width == 0 {
        return 1;
    }
    let ratio = orig_height as f64 / orig_width as f64;
    ((width as f64 * ratio).round() as u32).max(1)
}

fn apply(img: DynamicImage, op: &Transform) -> DynamicImage {
    match op {
        Transform::Crop(rect) => img.crop_imm(rect.x, rect.y, rect.width, rect.height),
        Transform::Resize(size) => resize(img, *size),
    }
}

fn encode(img: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>, ImagingError> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))?;
        }
        other => img.write_to(&mut Cursor::new(&mut buf), other)?,
    }
    Ok(buf)
}

#[async_trait]
impl ImageTool for RustImageTool {
    async fn transform(
        &self,
        data: Bytes,
        format: ImageFormat,
        ops: &[Transform],
        quality: u8,
    ) -> Result<Bytes, ImagingError> {
        let ops = ops.to_vec();

        tokio::task::spawn_blocking(move || {
            let img = image::load_from_memory_with_format(&data, format)?;
            let img = ops.iter().fold(img, apply);
            encode(&img, format, quality).map(Bytes::from)
        })
        .await?
    }

    async fn thumbnail(
        &self,
        source: &Path,
        target: &Path,
        size: ThumbSize,
    ) -> Result<(), ImagingError> {
        let source = source.to_path_buf();
        let target = target.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let reader = ImageReader::open(&source)?.with_guessed_format()?;
            let source_format = reader.format();
            let img = reader.decode()?;

            let thumb = match size {
                ThumbSize::Box { width, height } => img.thumbnail(width, height),
                ThumbSize::Width(_) => resize(img, size),
            };

            let format = ImageFormat::from_path(&target)
                .ok()
                .or(source_format)
                .ok_or_else(|| ImagingError::UnsupportedFormat(target.display().to_string()))?;

            let bytes = encode(&thumb, format, THUMBNAIL_QUALITY)?;
            std::fs::write(&target, bytes)?;
            Ok(())
        })
        .await?
    }
}
