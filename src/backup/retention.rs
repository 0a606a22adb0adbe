use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::backup::catalog;
use crate::error::{ColvaultError, Result};
use crate::types::BackupEntry;

/// Delete all but the `keep` newest entries of an oldest-first catalog.
///
/// Best effort: a failed delete is logged and the rest still go. Returns the
/// entries actually deleted.
pub fn prune(backups: &[BackupEntry], keep: usize) -> Vec<BackupEntry> {
    let excess = backups.len().saturating_sub(keep);
    let mut deleted = Vec::with_capacity(excess);
    for entry in backups.iter().take(excess) {
        match fs::remove_file(&entry.path) {
            Ok(()) => {
                info!(path = %entry.path.display(), "backup deleted");
                deleted.push(entry.clone());
            }
            Err(err) => {
                error!(path = %entry.path.display(), error = %err, "failed to delete backup");
            }
        }
    }
    deleted
}

/// Delete specific backups of `collection`. Every path must be one of its
/// catalogued backups, otherwise nothing is deleted. Returns whether all
/// deletes succeeded.
pub fn delete_backups(collection: &Path, targets: &[PathBuf]) -> Result<bool> {
    let known: Vec<PathBuf> = catalog::list_for_collection(collection)?
        .into_iter()
        .map(|entry| fs::canonicalize(&entry.path).unwrap_or(entry.path))
        .collect();
    if let Some(stray) = targets.iter().find(|target| {
        let resolved = fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());
        !known.contains(&resolved)
    }) {
        return Err(ColvaultError::NotABackup(stray.clone()));
    }
    let mut all_deleted = true;
    for target in targets {
        match fs::remove_file(target) {
            Ok(()) => info!(path = %target.display(), "backup deleted"),
            Err(err) => {
                error!(path = %target.display(), error = %err, "failed to delete backup");
                all_deleted = false;
            }
        }
    }
    Ok(all_deleted)
}
