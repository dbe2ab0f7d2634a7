use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{
    handlers::{delete_file, download_headers, health_check, upload_file, upload_form},
    state::AppState,
};

/// Build the upload router.
///
/// Stored files are served from the public directory, so with the default
/// layout `/files/a.png` maps to `public/files/a.png`.
pub fn router(state: AppState) -> Router {
    let config = state.uploader.config();
    let public = Router::<()>::new()
        .fallback_service(ServeDir::new(&config.public_dir))
        .layer(middleware::from_fn_with_state(state.clone(), download_headers));
    let file_route = format!("{}/{{name}}", config.upload_url.trim_end_matches('/'));
    let body_limit = usize::try_from(config.max_post_size).unwrap_or(usize::MAX);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(upload_form))
        .route("/health", get(health_check))
        .route("/upload", post(upload_file))
        .route(&file_route, delete(delete_file).fallback_service(public.clone()))
        .fallback_service(public)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
