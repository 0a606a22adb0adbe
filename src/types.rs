use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::NaiveDateTime;

/// Attributes of the live collection file as seen by the backup subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionFile {
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl CollectionFile {
    pub fn stat(path: &Path) -> io::Result<Self> {
        let meta = fs::metadata(path)?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
            size: meta.len(),
            modified: meta.modified()?,
        })
    }

    /// File name of the collection, e.g. `collection.anki2`.
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }
}

/// One archive in the backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    /// Timestamp embedded in the file name; `None` if it does not parse.
    pub timestamp: Option<NaiveDateTime>,
    pub modified: SystemTime,
}

impl BackupEntry {
    pub fn file_name(&self) -> String {
        file_name_of(&self.path)
    }
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Modification times compared at millisecond precision, which is what
/// survives a copy onto most filesystems.
pub fn mtime_millis(time: SystemTime) -> i128 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i128,
        Err(e) => -(e.duration().as_millis() as i128),
    }
}

pub fn same_mtime(a: SystemTime, b: SystemTime) -> bool {
    mtime_millis(a) == mtime_millis(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn stat_reads_size_and_name() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("collection.anki2");
        fs::write(&path, vec![0u8; 1234]).expect("write");
        let col = CollectionFile::stat(&path).expect("stat");
        assert_eq!(col.size, 1234);
        assert_eq!(col.file_name(), "collection.anki2");
    }

    #[test]
    fn stat_rejects_directories() {
        let dir = TempDir::new().expect("tempdir");
        assert!(CollectionFile::stat(dir.path()).is_err());
    }

    #[test]
    fn mtime_comparison_ignores_sub_millisecond_noise() {
        let base = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert!(same_mtime(base, base + Duration::from_micros(400)));
        assert!(!same_mtime(base, base + Duration::from_millis(1)));
    }
}
