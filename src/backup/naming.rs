//! Backup file names: `<stem>-<yyyy-MM-dd-HH-mm><ext>`.
//!
//! The timestamp is fixed-width and zero-padded, so sorting names of one
//! collection sorts them chronologically.

use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::util::paths::split_extension;

pub type Timestamp = NaiveDateTime;

/// Extension written for new backups. Listing also accepts `.colpkg`.
pub const BACKUP_EXTENSION: &str = ".apkg";

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M";
const DOTTED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H.%M";
const DISPLAY_FORMAT: &str = "%d %b %Y %H:%M";

fn backup_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(.*)-(\d{4}-\d{2}-\d{2}-\d{2}[-.]\d{2})(?:\.\d{2})?\.(apkg|colpkg)$")
            .expect("backup name pattern")
    })
}

/// Name of a backup of `collection_name` taken at `timestamp`.
pub fn to_backup_name(collection_name: &str, timestamp: Timestamp) -> String {
    let (stem, _) = split_extension(collection_name);
    format!(
        "{}-{}{}",
        stem,
        timestamp.format(TIMESTAMP_FORMAT),
        BACKUP_EXTENSION
    )
}

/// Timestamp embedded in a backup file name. Foreign and legacy names give
/// `None`.
pub fn parse_timestamp(backup_name: &str) -> Option<Timestamp> {
    let caps = backup_name_regex().captures(backup_name)?;
    let raw = caps.get(2)?.as_str();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, DOTTED_TIMESTAMP_FORMAT))
        .ok()
}

/// Whether `backup_name` is a backup of the collection called
/// `collection_name`: stripping the timestamp and container extension must
/// leave the collection's stem.
pub fn matches_collection(backup_name: &str, collection_name: &str) -> bool {
    let (stem, _) = split_extension(collection_name);
    backup_name_regex()
        .captures(backup_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str() == stem)
        .unwrap_or(false)
}

/// Human-readable label such as `02 Nov 2022 14:30`, or the file name
/// itself when it carries no parseable timestamp.
pub fn describe_backup(backup_name: &str) -> String {
    match parse_timestamp(backup_name) {
        Some(ts) => ts.format(DISPLAY_FORMAT).to_string(),
        None => backup_name.to_string(),
    }
}
