use tracing::info;
use tracing_subscriber::EnvFilter;

use fileuploader::{
    config::ServerConfig,
    directory::ensure_dir,
    routes::router,
    state::AppState,
    uploader::Uploader,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = ServerConfig::from_env()?;

    // RUST_LOG wins; otherwise the upload `debug` option turns on the per-file report
    let default_filter = if config.upload.debug {
        "fileuploader=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    ensure_dir(config.upload.tmp_path()).await;
    ensure_dir(config.upload.upload_path()).await;

    let app_state = AppState {
        uploader: Uploader::new(config.upload),
    };
    let app = router(app_state);

    info!("Server listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
