//! Collision-safe destination names.
//!
//! `photo.png` becomes `photo_1.png`, then `photo_2.png`, and so on, until no
//! file in the destination directory matches case-insensitively.
//!
//! Resolution reads the directory and then the mover creates the file, with
//! nothing reserving the name in between. Two concurrent uploads of the same
//! name can therefore resolve to the same target.

use std::{collections::HashSet, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use tracing::{debug, warn};

use crate::utils::strip_to_basename;

static NAME_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*?)(?:_(\d+))?(\.[^.]*)?$").expect("static pattern"));

/// `name.ext` → `name_1.ext`, `name_1.ext` → `name_2.ext`.
pub fn increment_name(name: &str) -> String {
    let Some(caps) = NAME_COUNT.captures(name) else {
        return format!("{}_1", name);
    };
    let stem = caps.get(1).map_or("", |m| m.as_str());
    let ext = caps.get(3).map_or("", |m| m.as_str());
    let next = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map_or(1, |n| n + 1);
    format!("{}_{}{}", stem, next, ext)
}

/// Resolve `desired` against the names already present.
///
/// Returns `None` when nothing usable remains after stripping directory
/// components and leading dots.
pub fn resolve_unique_name<'a, I>(existing: I, desired: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut name = strip_to_basename(desired).to_string();
    if name.is_empty() {
        return None;
    }

    let taken: HashSet<String> = existing.into_iter().map(str::to_lowercase).collect();
    while taken.contains(&name.to_lowercase()) {
        name = increment_name(&name);
    }
    Some(name)
}

/// List `dir` and resolve a safe name for `desired` in it.
///
/// An unreadable directory counts as empty.
pub async fn safe_name(dir: &Path, desired: &str) -> Option<String> {
    let mut existing = Vec::new();

    match fs::read_dir(dir).await {
        Ok(mut entries) => loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => existing.push(entry.file_name().to_string_lossy().into_owned()),
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Failed to read directory entry");
                    break;
                }
            }
        },
        Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to list destination directory"),
    }

    let name = resolve_unique_name(existing.iter().map(String::as_str), desired);
    debug!(desired, resolved = ?name, "Make safe name");
    name
}
