use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{ColvaultError, Result};

pub const BACKUP_DIR_NAME: &str = "backup";
pub const BROKEN_DIR_NAME: &str = "broken";

/// Directory that holds the collection, i.e. the application data root.
pub fn data_root(collection: &Path) -> PathBuf {
    match collection.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

pub fn backup_dir_for(collection: &Path) -> PathBuf {
    data_root(collection).join(BACKUP_DIR_NAME)
}

pub fn broken_dir_for(collection: &Path) -> PathBuf {
    data_root(collection).join(BROKEN_DIR_NAME)
}

/// Create `path` if needed. Failure is only logged; callers find out when
/// they try to use the directory.
pub fn ensure_dir(path: &Path) -> bool {
    if path.is_dir() {
        return true;
    }
    match fs::create_dir_all(path) {
        Ok(()) => true,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "mkdirs failed");
            false
        }
    }
}

/// Immediate children of `path`. A missing directory has no entries.
pub fn list_entries(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = entry
            .map_err(|e| ColvaultError::message(format!("read {}: {}", path.display(), e)))?;
        out.push(entry.into_path());
    }
    Ok(out)
}

/// `(stem, extension)` of a file name, where the extension keeps its dot:
/// `collection.anki2` gives `("collection", ".anki2")`.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}
