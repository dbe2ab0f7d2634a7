use std::{
    env,
    net::SocketAddr,
    path::{Component, MAIN_SEPARATOR, Path, PathBuf},
};

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use validator::Validate;

static DEFAULT_ACCEPT_FILE_TYPES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i).+").expect("static pattern"));

static DEFAULT_IMAGE_TYPES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(gif|jpe?g|png)$").expect("static pattern"));

/// Errors raised while resolving upload or server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid pattern for {field}: {source}")]
    InvalidPattern {
        field: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),

    #[error("Invalid dimension for {0}: width and height must be non-zero")]
    ZeroDimension(&'static str),

    #[error("Environment error: {0}")]
    Env(String),
}

/// A target size for a resize or thumbnail.
///
/// Deserializes from a bare number (`140`, width only) or an array
/// (`[100, 100]`, or `[100]` where the height defaults to the width).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbSize {
    Width(u32),
    Box { width: u32, height: u32 },
}

impl ThumbSize {
    pub fn width(&self) -> u32 {
        match *self {
            ThumbSize::Width(width) | ThumbSize::Box { width, .. } => width,
        }
    }

    pub fn height(&self) -> Option<u32> {
        match *self {
            ThumbSize::Width(_) => None,
            ThumbSize::Box { height, .. } => Some(height),
        }
    }

    /// Tag used in thumbnail file and directory names: `100x100` or `140`.
    pub fn tag(&self) -> String {
        match self {
            ThumbSize::Width(width) => width.to_string(),
            ThumbSize::Box { width, height } => format!("{}x{}", width, height),
        }
    }

    /// Key used in the per-file thumbnail map: `100_100` or `140`.
    pub fn key(&self) -> String {
        match self {
            ThumbSize::Width(width) => width.to_string(),
            ThumbSize::Box { width, height } => format!("{}_{}", width, height),
        }
    }

    fn is_zero(&self) -> bool {
        self.width() == 0 || self.height() == Some(0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawThumbSize {
    Scalar(u32),
    List(Vec<u32>),
}

impl<'de> Deserialize<'de> for ThumbSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match RawThumbSize::deserialize(deserializer)? {
            RawThumbSize::Scalar(width) => Ok(ThumbSize::Width(width)),
            RawThumbSize::List(dims) => match dims.as_slice() {
                [width] => Ok(ThumbSize::Box { width: *width, height: *width }),
                [width, height] => Ok(ThumbSize::Box { width: *width, height: *height }),
                _ => Err(serde::de::Error::custom(
                    "size must be a number or an array of one or two numbers",
                )),
            },
        }
    }
}

/// Crop rectangle applied to images before they are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CropRect {
    #[serde(default)]
    pub x: u32,
    #[serde(default)]
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Default for CropRect {
    fn default() -> Self {
        Self { x: 0, y: 0, width: 100, height: 100 }
    }
}

/// Caller-supplied upload options. Every field is optional; absent fields
/// take the defaults in [`UploadConfig::resolve`]. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadOptions {
    pub debug: Option<bool>,
    pub safe_name: Option<bool>,
    pub validate: Option<bool>,
    pub resize: Option<bool>,
    pub crop: Option<bool>,
    pub quality: Option<u8>,
    pub thumbnails: Option<bool>,
    pub thumb_to_sub_dir: Option<bool>,
    pub tmp_dir: Option<String>,
    pub public_dir: Option<String>,
    pub upload_dir: Option<String>,
    pub upload_url: Option<String>,
    pub max_post_size: Option<u64>,
    pub min_file_size: Option<u64>,
    pub max_file_size: Option<u64>,
    pub accept_file_types: Option<String>,
    pub thumb_sizes: Option<Vec<ThumbSize>>,
    pub new_size: Option<ThumbSize>,
    pub coordinates: Option<CropRect>,
    pub inline_file_types: Option<String>,
    pub image_types: Option<String>,
}

/// Fully resolved upload configuration. Built once and shared read-only.
#[derive(Debug, Clone, Validate)]
pub struct UploadConfig {
    pub debug: bool,
    pub safe_name: bool,
    pub validate: bool,
    pub resize: bool,
    pub crop: bool,
    #[validate(range(min = 1, max = 100))]
    pub quality: u8,
    pub thumbnails: bool,
    pub thumb_to_sub_dir: bool,
    pub tmp_dir: String,
    pub public_dir: String,
    pub upload_dir: String,
    #[validate(length(min = 1))]
    pub upload_url: String,
    #[validate(range(min = 1))]
    pub max_post_size: u64,
    pub min_file_size: u64,
    pub max_file_size: u64,
    pub accept_file_types: Regex,
    pub thumb_sizes: Vec<ThumbSize>,
    pub new_size: ThumbSize,
    pub coordinates: CropRect,
    pub inline_file_types: Regex,
    pub image_types: Regex,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            debug: false,
            safe_name: true,
            validate: false,
            resize: false,
            crop: false,
            quality: 80,
            thumbnails: false,
            thumb_to_sub_dir: false,
            tmp_dir: normalize_dir("./tmp"),
            public_dir: normalize_dir("./public"),
            upload_dir: normalize_dir("./public/files"),
            upload_url: "/files/".to_string(),
            max_post_size: 11_000_000,
            min_file_size: 1,
            max_file_size: 10_000_000,
            accept_file_types: DEFAULT_ACCEPT_FILE_TYPES.clone(),
            thumb_sizes: vec![ThumbSize::Box { width: 100, height: 100 }],
            new_size: ThumbSize::Box { width: 800, height: 600 },
            coordinates: CropRect::default(),
            inline_file_types: DEFAULT_IMAGE_TYPES.clone(),
            image_types: DEFAULT_IMAGE_TYPES.clone(),
        }
    }
}

impl UploadConfig {
    /// Merge `options` over the defaults and normalize directory paths.
    pub fn resolve(options: UploadOptions) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            debug: options.debug.unwrap_or(defaults.debug),
            safe_name: options.safe_name.unwrap_or(defaults.safe_name),
            validate: options.validate.unwrap_or(defaults.validate),
            resize: options.resize.unwrap_or(defaults.resize),
            crop: options.crop.unwrap_or(defaults.crop),
            quality: options.quality.unwrap_or(defaults.quality),
            thumbnails: options.thumbnails.unwrap_or(defaults.thumbnails),
            thumb_to_sub_dir: options.thumb_to_sub_dir.unwrap_or(defaults.thumb_to_sub_dir),
            tmp_dir: options.tmp_dir.as_deref().map(normalize_dir).unwrap_or(defaults.tmp_dir),
            public_dir: options
                .public_dir
                .as_deref()
                .map(normalize_dir)
                .unwrap_or(defaults.public_dir),
            upload_dir: options
                .upload_dir
                .as_deref()
                .map(normalize_dir)
                .unwrap_or(defaults.upload_dir),
            upload_url: options
                .upload_url
                .as_deref()
                .map(normalize_url)
                .unwrap_or(defaults.upload_url),
            max_post_size: options.max_post_size.unwrap_or(defaults.max_post_size),
            min_file_size: options.min_file_size.unwrap_or(defaults.min_file_size),
            max_file_size: options.max_file_size.unwrap_or(defaults.max_file_size),
            accept_file_types: compile_or(
                "acceptFileTypes",
                options.accept_file_types,
                defaults.accept_file_types,
            )?,
            thumb_sizes: options.thumb_sizes.unwrap_or(defaults.thumb_sizes),
            new_size: options.new_size.unwrap_or(defaults.new_size),
            coordinates: options.coordinates.unwrap_or(defaults.coordinates),
            inline_file_types: compile_or(
                "inlineFileTypes",
                options.inline_file_types,
                defaults.inline_file_types,
            )?,
            image_types: compile_or("imageTypes", options.image_types, defaults.image_types)?,
        };

        config.validate()?;
        if config.thumb_sizes.iter().any(ThumbSize::is_zero) {
            return Err(ConfigError::ZeroDimension("thumbSizes"));
        }
        if config.new_size.is_zero() {
            return Err(ConfigError::ZeroDimension("newSize"));
        }
        if config.coordinates.width == 0 || config.coordinates.height == 0 {
            return Err(ConfigError::ZeroDimension("coordinates"));
        }

        Ok(config)
    }

    pub fn upload_path(&self) -> &Path {
        Path::new(&self.upload_dir)
    }

    pub fn tmp_path(&self) -> &Path {
        Path::new(&self.tmp_dir)
    }

    /// True when `name` should be treated as an image for resize and thumbnails.
    pub fn is_image(&self, name: &str) -> bool {
        self.image_types.is_match(name)
    }

    /// True when a stored file may be displayed by the browser instead of
    /// downloaded.
    pub fn is_inline(&self, name: &str) -> bool {
        self.inline_file_types.is_match(name)
    }
}

fn compile_or(
    field: &'static str,
    pattern: Option<String>,
    default: Regex,
) -> Result<Regex, ConfigError> {
    match pattern {
        Some(pattern) => {
            Regex::new(&pattern).map_err(|source| ConfigError::InvalidPattern { field, source })
        }
        None => Ok(default),
    }
}

/// Root a public URL prefix and end it with a single `/`, so it can be both
/// prepended to file names and mounted as a route.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    format!("/{}/", trimmed)
}

/// Lexically normalize a directory path and terminate it with exactly one
/// platform separator.
pub fn normalize_dir(raw: &str) -> String {
    let mut normalized = PathBuf::new();
    for component in Path::new(raw).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(normalized.components().next_back(), Some(Component::Normal(_))) {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut out = normalized.to_string_lossy().into_owned();
    if out.is_empty() {
        out.push('.');
    }
    if !out.ends_with(MAIN_SEPARATOR) {
        out.push(MAIN_SEPARATOR);
    }
    out
}

/// Settings for the demo upload server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub upload: UploadConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// `UPLOAD_OPTIONS` holds inline JSON options, `UPLOAD_OPTIONS_FILE` a
    /// path to a JSON file; the inline form wins when both are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load environment variables from `.env` file (if it exists)
        dotenv().ok();

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
            .parse()
            .map_err(|e| ConfigError::Env(format!("BIND_ADDR: {}", e)))?;

        let raw_options = match (env::var("UPLOAD_OPTIONS"), env::var("UPLOAD_OPTIONS_FILE")) {
            (Ok(inline), _) => Some(inline),
            (Err(_), Ok(path)) => Some(
                std::fs::read_to_string(&path)
                    .map_err(|e| ConfigError::Env(format!("UPLOAD_OPTIONS_FILE {}: {}", path, e)))?,
            ),
            _ => None,
        };

        let options = match raw_options {
            Some(raw) => serde_json::from_str::<UploadOptions>(&raw)
                .map_err(|e| ConfigError::Env(format!("UPLOAD_OPTIONS: {}", e)))?,
            None => UploadOptions::default(),
        };

        Ok(Self {
            bind_addr,
            upload: UploadConfig::resolve(options)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sep() -> String {
        MAIN_SEPARATOR.to_string()
    }

    #[test]
    fn normalize_dir_appends_single_separator() {
        assert_eq!(normalize_dir("/var/uploads"), format!("/var/uploads{}", sep()));
        assert_eq!(normalize_dir("/var/uploads/"), "/var/uploads/");
        assert_eq!(normalize_dir("/var/uploads///"), "/var/uploads/");
        assert_eq!(normalize_dir("/var//uploads/./files/../"), "/var/uploads/");
        assert_eq!(normalize_dir("./tmp"), "tmp/");
        assert_eq!(normalize_dir(""), "./");
        assert_eq!(normalize_dir("/"), "/");
    }

    #[test]
    fn upload_url_is_rooted() {
        assert_eq!(normalize_url("files/"), "/files/");
        assert_eq!(normalize_url("/media/uploads"), "/media/uploads/");
        assert_eq!(normalize_url("//files//"), "/files/");
        assert_eq!(normalize_url(""), "/");

        let config = UploadConfig::resolve(UploadOptions {
            upload_url: Some("files".into()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.upload_url, "/files/");
    }

    #[test]
    fn resolve_fills_defaults() {
        let config = UploadConfig::resolve(UploadOptions::default()).unwrap();
        assert!(config.safe_name);
        assert!(!config.validate);
        assert_eq!(config.upload_url, "/files/");
        assert_eq!(config.min_file_size, 1);
        assert_eq!(config.max_file_size, 10_000_000);
        assert_eq!(config.thumb_sizes, vec![ThumbSize::Box { width: 100, height: 100 }]);
        assert!(config.upload_dir.ends_with("public/files/"));
        assert!(config.is_image("PHOTO.JPG"));
        assert!(!config.is_image("notes.txt"));
    }

    #[test]
    fn resolve_merges_json_options() {
        let options: UploadOptions = serde_json::from_str(
            r#"{
                "validate": true,
                "thumbnails": true,
                "thumbToSubDir": true,
                "uploadDir": "/srv/files//",
                "thumbSizes": [140, [100, 100], [64]],
                "acceptFileTypes": "(?i)\\.(png|jpe?g)$",
                "somethingElse": 42
            }"#,
        )
        .unwrap();
        let config = UploadConfig::resolve(options).unwrap();

        assert!(config.validate);
        assert!(config.thumb_to_sub_dir);
        assert_eq!(config.upload_dir, "/srv/files/");
        assert_eq!(
            config.thumb_sizes,
            vec![
                ThumbSize::Width(140),
                ThumbSize::Box { width: 100, height: 100 },
                ThumbSize::Box { width: 64, height: 64 },
            ]
        );
        assert!(config.accept_file_types.is_match("a.PNG"));
        assert!(!config.accept_file_types.is_match("doc.exe"));
    }

    #[test]
    fn resolve_rejects_bad_values() {
        let bad_pattern = UploadOptions {
            accept_file_types: Some("(".into()),
            ..Default::default()
        };
        assert!(matches!(
            UploadConfig::resolve(bad_pattern),
            Err(ConfigError::InvalidPattern { field: "acceptFileTypes", .. })
        ));

        let bad_quality = UploadOptions { quality: Some(0), ..Default::default() };
        assert!(matches!(UploadConfig::resolve(bad_quality), Err(ConfigError::Invalid(_))));

        let zero_thumb = UploadOptions {
            thumb_sizes: Some(vec![ThumbSize::Width(0)]),
            ..Default::default()
        };
        assert!(matches!(
            UploadConfig::resolve(zero_thumb),
            Err(ConfigError::ZeroDimension("thumbSizes"))
        ));
    }

    #[test]
    fn thumb_size_tags_and_keys() {
        let boxed = ThumbSize::Box { width: 100, height: 80 };
        assert_eq!(boxed.tag(), "100x80");
        assert_eq!(boxed.key(), "100_80");
        let width = ThumbSize::Width(140);
        assert_eq!(width.tag(), "140");
        assert_eq!(width.key(), "140");
        assert!(serde_json::from_str::<ThumbSize>("[1, 2, 3]").is_err());
    }
}
