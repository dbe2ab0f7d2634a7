use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use tokio::fs;
use tracing::{debug, warn};

/// Create every missing segment of `dir`, from the root down.
///
/// Existing segments and segments created concurrently by someone else are
/// fine. Any other failure is logged and swallowed; a later write into the
/// directory will surface it.
pub async fn ensure_dir(dir: impl AsRef<Path>) {
    let mut current = PathBuf::new();

    for component in dir.as_ref().components() {
        current.push(component.as_os_str());

        match fs::metadata(&current).await {
            Ok(meta) if meta.is_dir() => continue,
            Ok(_) => {
                warn!(path = %current.display(), "Path segment exists but is not a directory");
                return;
            }
            Err(_) => {}
        }

        debug!(path = %current.display(), "Create target directory");
        match fs::create_dir(&current).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
            Err(e) => {
                warn!(path = %current.display(), error = %e, "Could not create directory");
                return;
            }
        }
    }
}
