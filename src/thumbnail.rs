use std::path::PathBuf;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::{
    config::{ThumbSize, UploadConfig},
    directory::ensure_dir,
    imaging::ImageTool,
    models::FileResult,
};

/// Where one thumbnail of a stored file goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbTarget {
    pub size: ThumbSize,
    pub dir: PathBuf,
    pub path: PathBuf,
    pub url: String,
    pub key: String,
}

/// Compute the target for `size`.
///
/// Sub-directory mode stores `<upload_dir>/<tag>/<name>`; otherwise the
/// thumbnail sits next to the original as `thumb_<tag>_<name>`.
pub fn thumb_target(config: &UploadConfig, name: &str, size: ThumbSize) -> ThumbTarget {
    let tag = size.tag();
    let (dir, file_name, url) = if config.thumb_to_sub_dir {
        (
            PathBuf::from(&config.upload_dir).join(&tag),
            name.to_string(),
            format!("{}{}/{}", config.upload_url, tag, name),
        )
    } else {
        let file_name = format!("thumb_{}_{}", tag, name);
        (
            PathBuf::from(&config.upload_dir),
            file_name.clone(),
            format!("{}{}", config.upload_url, file_name),
        )
    };

    ThumbTarget {
        size,
        path: dir.join(file_name),
        dir,
        url,
        key: size.key(),
    }
}

/// Generate every configured thumbnail for a stored file.
///
/// Sizes run concurrently and are all awaited before returning. A failed
/// size is logged and left out of the result; the file itself still counts
/// as uploaded.
pub async fn create_thumbnails(
    mut result: FileResult,
    config: &UploadConfig,
    images: &dyn ImageTool,
) -> FileResult {
    if !config.thumbnails || !result.success || !config.is_image(&result.original_name) {
        return result;
    }

    let source = PathBuf::from(&result.destination_dir).join(&result.name);
    let targets: Vec<_> = config
        .thumb_sizes
        .iter()
        .map(|size| thumb_target(config, &result.name, *size))
        .collect();
    debug!(file = %result.name, sizes = targets.len(), "Create thumbnails");

    let outcomes = join_all(targets.into_iter().map(|target| {
        let source = &source;
        async move {
            if config.thumb_to_sub_dir {
                ensure_dir(&target.dir).await;
            }
            let outcome = images.thumbnail(source, &target.path, target.size).await;
            (target, outcome)
        }
    }))
    .await;

    for (target, outcome) in outcomes {
        match outcome {
            Ok(()) => {
                debug!(key = %target.key, url = %target.url, "Thumbnail created");
                result.record_thumbnail(target.key, target.url);
            }
            Err(e) => warn!(
                file = %result.name,
                size = %target.size.tag(),
                error = %e,
                "Thumbnail generation failed"
            ),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::{UploadOptions, normalize_dir},
        imaging::testing::RecordingTool,
        models::UploadedFile,
    };
    use std::path::Path;
    use tempfile::TempDir;

    fn config(dir: &Path, options: UploadOptions) -> UploadConfig {
        UploadConfig::resolve(UploadOptions {
            thumbnails: options.thumbnails.or(Some(true)),
            upload_dir: Some(dir.to_string_lossy().into_owned()),
            ..options
        })
        .unwrap()
    }

    fn stored(dir: &Path, name: &str) -> FileResult {
        std::fs::write(dir.join(name), b"img").unwrap();
        let file = UploadedFile {
            path: dir.join("tmp"),
            name: name.to_string(),
            size: 3,
            content_type: "image/png".into(),
        };
        let mut result = FileResult::new(&file, &normalize_dir(&dir.to_string_lossy()));
        result.url = format!("/files/{}", name);
        result.succeed()
    }

    #[test]
    fn targets_in_sub_dirs() {
        let cfg = config(
            Path::new("/srv/files"),
            UploadOptions { thumb_to_sub_dir: Some(true), ..Default::default() },
        );

        let boxed = thumb_target(&cfg, "a.png", ThumbSize::Box { width: 100, height: 100 });
        assert_eq!(boxed.dir, PathBuf::from("/srv/files/100x100"));
        assert_eq!(boxed.path, PathBuf::from("/srv/files/100x100/a.png"));
        assert_eq!(boxed.url, "/files/100x100/a.png");
        assert_eq!(boxed.key, "100_100");

        let width = thumb_target(&cfg, "a.png", ThumbSize::Width(140));
        assert_eq!(width.path, PathBuf::from("/srv/files/140/a.png"));
        assert_eq!(width.url, "/files/140/a.png");
        assert_eq!(width.key, "140");
    }

    #[test]
    fn targets_alongside_original() {
        let cfg = config(Path::new("/srv/files"), UploadOptions::default());

        let boxed = thumb_target(&cfg, "a.png", ThumbSize::Box { width: 100, height: 80 });
        assert_eq!(boxed.path, PathBuf::from("/srv/files/thumb_100x80_a.png"));
        assert_eq!(boxed.url, "/files/thumb_100x80_a.png");
        assert_eq!(boxed.key, "100_80");
    }

    #[tokio::test]
    async fn records_every_size() {
        let dir = TempDir::new().unwrap();
        let cfg = config(
            dir.path(),
            UploadOptions {
                thumb_to_sub_dir: Some(true),
                thumb_sizes: Some(vec![
                    ThumbSize::Width(140),
                    ThumbSize::Box { width: 100, height: 100 },
                ]),
                ..Default::default()
            },
        );
        let tool = RecordingTool::default();

        let result = create_thumbnails(stored(dir.path(), "a.png"), &cfg, &tool).await;

        assert_eq!(tool.thumbnail_calls(), 2);
        assert_eq!(result.thumbnails, vec!["/files/140/a.png", "/files/100x100/a.png"]);
        assert_eq!(result.thumbnail_obj["140"], "/files/140/a.png");
        assert_eq!(result.thumbnail_obj["100_100"], "/files/100x100/a.png");
        assert!(dir.path().join("140/a.png").exists());
        assert!(dir.path().join("100x100/a.png").exists());
    }

    #[tokio::test]
    async fn failed_size_does_not_stop_siblings() {
        let dir = TempDir::new().unwrap();
        let failing = ThumbSize::Box { width: 50, height: 50 };
        let cfg = config(
            dir.path(),
            UploadOptions {
                thumb_sizes: Some(vec![failing, ThumbSize::Box { width: 100, height: 100 }]),
                ..Default::default()
            },
        );
        let tool = RecordingTool { fail_thumbnails_for: Some(failing), ..Default::default() };

        let result = create_thumbnails(stored(dir.path(), "a.png"), &cfg, &tool).await;

        assert!(result.success);
        assert_eq!(tool.thumbnail_calls(), 2);
        assert_eq!(result.thumbnails, vec!["/files/thumb_100x100_a.png"]);
        assert!(!result.thumbnail_obj.contains_key("50_50"));
    }

    #[tokio::test]
    async fn skips_non_images_and_disabled_thumbnails() {
        let dir = TempDir::new().unwrap();
        let tool = RecordingTool::default();

        let cfg = config(dir.path(), UploadOptions::default());
        let result = create_thumbnails(stored(dir.path(), "notes.txt"), &cfg, &tool).await;
        assert!(result.thumbnails.is_empty());

        let cfg = config(
            dir.path(),
            UploadOptions { thumbnails: Some(false), ..Default::default() },
        );
        let result = create_thumbnails(stored(dir.path(), "a.png"), &cfg, &tool).await;
        assert!(result.thumbnails.is_empty());

        assert_eq!(tool.thumbnail_calls(), 0);
    }
}
