use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{error, info};

use crate::clock::Clock;
use crate::error::{ColvaultError, Result};
use crate::types::file_name_of;
use crate::util::paths::{broken_dir_for, data_root, ensure_dir, list_entries, split_extension};

/// Moves suspect collection files into the `broken/` holding directory.
pub struct QuarantineManager {
    clock: Arc<dyn Clock>,
}

impl QuarantineManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Move `path` to `broken/<stem>-corrupt-<date>[-N]<ext>` and return the
    /// new location. Existing files are never overwritten.
    ///
    /// With `move_siblings`, every other entry next to `path` whose name
    /// starts with its file name (journals, wal/shm files) follows it under
    /// the quarantined name. A failed sibling move fails the whole call, but
    /// siblings already moved stay moved.
    pub fn quarantine(&self, path: &Path, move_siblings: bool) -> Result<PathBuf> {
        let original_name = file_name_of(path);
        if original_name.is_empty() {
            return Err(ColvaultError::message(format!(
                "{} has no file name",
                path.display()
            )));
        }
        let broken_dir = broken_dir_for(path);
        ensure_dir(&broken_dir);

        let today = self.clock.now().date();
        let target = free_target(&broken_dir, &original_name, today);
        let moved_name = file_name_of(&target);
        fs::rename(path, &target).map_err(|e| {
            error!(path = %path.display(), error = %e, "could not move corrupt file to broken directory");
            ColvaultError::message(format!(
                "rename {} to {}: {}",
                path.display(),
                target.display(),
                e
            ))
        })?;
        info!(from = %path.display(), to = %target.display(), "quarantined collection");

        if move_siblings {
            for sibling in list_entries(&data_root(path))? {
                let name = file_name_of(&sibling);
                if !name.starts_with(&original_name) {
                    continue;
                }
                let dest = broken_dir.join(name.replacen(&original_name, &moved_name, 1));
                if dest.exists() {
                    return Err(ColvaultError::message(format!(
                        "{} already exists",
                        dest.display()
                    )));
                }
                fs::rename(&sibling, &dest).map_err(|e| {
                    error!(path = %sibling.display(), error = %e, "could not move sibling to broken directory");
                    ColvaultError::message(format!(
                        "rename {} to {}: {}",
                        sibling.display(),
                        dest.display(),
                        e
                    ))
                })?;
                info!(from = %sibling.display(), to = %dest.display(), "quarantined sibling");
            }
        }
        Ok(target)
    }
}

/// First `<stem>-corrupt-<date>[-N]<ext>` in `dir` that does not exist.
fn free_target(dir: &Path, original_name: &str, today: NaiveDate) -> PathBuf {
    let (stem, ext) = split_extension(original_name);
    let base = format!("{}-corrupt-{}", stem, today.format("%Y-%m-%d"));
    let mut candidate = dir.join(format!("{}{}", base, ext));
    let mut n = 1u32;
    while fs::symlink_metadata(&candidate).is_ok() {
        candidate = dir.join(format!("{}-{}{}", base, n, ext));
        n += 1;
    }
    candidate
}
