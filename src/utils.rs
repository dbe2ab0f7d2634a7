use std::path::Path;

use uuid::Uuid;

/// Extracts the file extension from a filename and converts it to lowercase.
pub fn get_file_extension(filename: &str) -> Option<String> {
    Path::new(filename) // treats string as filesystem path.
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Generates a temp file name: a random id plus the lowercased extension of
/// `original_name` (`3f2a...c1.png`).
pub fn temp_file_name(original_name: &str) -> String {
    match get_file_extension(original_name) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    }
}

/// Last path component of `name` with any leading dots removed.
///
/// Handles both `/` and `\` since client-supplied names come from any OS.
pub fn strip_to_basename(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.trim_start_matches('.')
}

/// Falls back to a generic content type when the client sent none.
pub fn content_type_or_default(content_type: Option<&str>) -> String {
    content_type
        .filter(|ct| !ct.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string()
}
