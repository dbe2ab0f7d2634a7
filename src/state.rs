use crate::uploader::Uploader;

/// Central application state shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Upload pipeline, holding the resolved configuration and image tool.
    pub uploader: Uploader,
}
