use std::fs;
use std::path::Path;

use tracing::debug;

use crate::backup::naming::{matches_collection, parse_timestamp, Timestamp};
use crate::error::Result;
use crate::types::{file_name_of, BackupEntry};
use crate::util::paths::{backup_dir_for, list_entries};

/// Backups of `collection_name` found in `dir`, oldest first by embedded
/// timestamp; the file name breaks ties.
///
/// Always read from disk; a missing directory is an empty catalog.
pub fn list(dir: &Path, collection_name: &str) -> Result<Vec<BackupEntry>> {
    let mut backups = Vec::new();
    for path in list_entries(dir)? {
        let name = file_name_of(&path);
        if !matches_collection(&name, collection_name) {
            continue;
        }
        let meta = match fs::metadata(&path) {
            Ok(meta) => meta,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skip unreadable backup");
                continue;
            }
        };
        if !meta.is_file() {
            continue;
        }
        backups.push(BackupEntry {
            timestamp: parse_timestamp(&name),
            modified: meta.modified()?,
            path,
        });
    }
    backups.sort_by_cached_key(|entry| (entry.timestamp, entry.file_name()));
    Ok(backups)
}

/// Backups belonging to the collection at `collection`, from its sibling
/// `backup/` directory.
pub fn list_for_collection(collection: &Path) -> Result<Vec<BackupEntry>> {
    list(&backup_dir_for(collection), &file_name_of(collection))
}

/// Embedded timestamp of the newest backup whose name parses, scanning
/// back from the most recent.
pub fn last_backup_time(backups: &[BackupEntry]) -> Option<Timestamp> {
    backups.iter().rev().find_map(|entry| entry.timestamp)
}

pub fn latest(backups: &[BackupEntry]) -> Option<&BackupEntry> {
    backups.last()
}
