use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::backup::archive::{entry_size, extract_collection};
use crate::backup::catalog;
use crate::config::Settings;
use crate::disk::{check_space, FreeSpace, SpaceCheck};
use crate::error::{ColvaultError, Result};
use crate::repair::QuarantineManager;
use crate::util::paths::data_root;

/// Put the collection from `backup` in place of `collection`.
///
/// A collection that is still present is quarantined first. The restored
/// file gets the backup's mtime, so the next backup decision sees it as
/// already backed up.
pub fn restore_backup(
    collection: &Path,
    backup: &Path,
    settings: &Settings,
    free_space: &dyn FreeSpace,
    quarantine: &QuarantineManager,
) -> Result<PathBuf> {
    let backup_mtime = fs::metadata(backup)
        .and_then(|meta| meta.modified())
        .map_err(|e| ColvaultError::message(format!("stat {}: {}", backup.display(), e)))?;
    let size = entry_size(backup)?;

    let root = data_root(collection);
    let required = settings.required_free_space(size);
    if let SpaceCheck::Short { available } = check_space(free_space, &root, required) {
        error!(path = %collection.display(), required, ?available, "not enough space to restore");
        return Err(ColvaultError::OutOfSpace {
            required,
            available,
        });
    }

    let tmp = tempfile::Builder::new()
        .prefix(".colvault-restore-")
        .suffix(".partial")
        .tempfile_in(&root)?;
    extract_collection(backup, tmp.as_file())?;
    tmp.as_file().set_modified(backup_mtime)?;

    if fs::symlink_metadata(collection).is_ok() {
        let moved = quarantine.quarantine(collection, false)?;
        info!(path = %moved.display(), "moved current collection aside before restore");
    }
    tmp.persist_noclobber(collection)
        .map_err(|e| ColvaultError::Io(e.error))?;
    info!(from = %backup.display(), to = %collection.display(), "backup restored");
    Ok(collection.to_path_buf())
}

/// If the collection file has disappeared, restore its newest backup.
/// Returns the backup used, or `None` when nothing needed (or could be)
/// restored.
pub fn restore_if_missing(
    collection: &Path,
    settings: &Settings,
    free_space: &dyn FreeSpace,
    quarantine: &QuarantineManager,
) -> Result<Option<PathBuf>> {
    if !settings.backup_enabled || fs::symlink_metadata(collection).is_ok() {
        return Ok(None);
    }
    error!(path = %collection.display(), "collection has been deleted; restoring it");
    let backups = catalog::list_for_collection(collection)?;
    let Some(latest) = catalog::latest(&backups) else {
        warn!(path = %collection.display(), "collection could not be restored: no backups");
        return Ok(None);
    };
    restore_backup(collection, &latest.path, settings, free_space, quarantine)?;
    Ok(Some(latest.path.clone()))
}
