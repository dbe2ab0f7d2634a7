//! File upload handling for axum: multipart and XHR stream uploads,
//! size/type validation, collision-safe storage and image thumbnails.

pub mod config;
pub mod directory;
pub mod error;
pub mod handlers;
pub mod imaging;
pub mod models;
pub mod mover;
pub mod naming;
pub mod receiver;
pub mod routes;
pub mod state;
pub mod thumbnail;
pub mod uploader;
pub mod utils;
pub mod validate;

pub use config::{ConfigError, CropRect, ThumbSize, UploadConfig, UploadOptions};
pub use error::{AppError, UploadError, ValidationError};
pub use imaging::{ImageTool, ImagingError, RustImageTool, Transform};
pub use models::{FileField, FileResult, UploadOutcome, UploadedFile};
pub use uploader::Uploader;
