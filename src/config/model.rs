use serde::{Deserialize, Serialize};

pub const DEFAULT_INTERVAL_HOURS: u32 = 5;
pub const DEFAULT_RETENTION_COUNT: usize = 8;
pub const DEFAULT_MIN_FREE_SPACE_MB: u64 = 10;
pub const DEFAULT_MIN_COLLECTION_SIZE: u64 = 10_000;

const MEGABYTE: u64 = 1024 * 1024;

/// Backup preferences as stored by the host application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct Settings {
    #[serde(default = "default_true", rename = "useBackup")]
    pub backup_enabled: bool,
    #[serde(default = "default_retention", rename = "backupMax")]
    pub retention_count: usize,
    #[serde(default = "default_interval", rename = "backupInterval")]
    pub interval_hours: u32,
    #[serde(default = "default_min_free_space", rename = "minFreeSpaceMb")]
    pub min_free_space_mb: u64,
    #[serde(default = "default_min_size", rename = "minCollectionSize")]
    pub min_valid_collection_size: u64,
    #[serde(default, rename = "noSpaceLeft")]
    pub no_space_left: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backup_enabled: true,
            retention_count: DEFAULT_RETENTION_COUNT,
            interval_hours: DEFAULT_INTERVAL_HOURS,
            min_free_space_mb: DEFAULT_MIN_FREE_SPACE_MB,
            min_valid_collection_size: DEFAULT_MIN_COLLECTION_SIZE,
            no_space_left: false,
        }
    }
}

impl Settings {
    pub fn min_free_space_bytes(&self) -> u64 {
        self.min_free_space_mb.saturating_mul(MEGABYTE)
    }

    /// Bytes that must be free before copying a collection of `size` bytes.
    pub fn required_free_space(&self, size: u64) -> u64 {
        size.saturating_add(self.min_free_space_bytes())
    }
}

fn default_true() -> bool {
    true
}

fn default_retention() -> usize {
    DEFAULT_RETENTION_COUNT
}

fn default_interval() -> u32 {
    DEFAULT_INTERVAL_HOURS
}

fn default_min_free_space() -> u64 {
    DEFAULT_MIN_FREE_SPACE_MB
}

fn default_min_size() -> u64 {
    DEFAULT_MIN_COLLECTION_SIZE
}
