use std::io;
use std::path::Path;

use tracing::warn;

/// Free-space query for the filesystem backing a path.
pub trait FreeSpace: Send + Sync {
    fn available_space(&self, path: &Path) -> io::Result<u64>;
}

/// Free space as reported by the OS (`statvfs` / `GetDiskFreeSpaceEx`).
#[derive(Debug, Default, Clone, Copy)]
pub struct FsFreeSpace;

impl FreeSpace for FsFreeSpace {
    fn available_space(&self, path: &Path) -> io::Result<u64> {
        fs2::available_space(path)
    }
}

/// Fixed answer, or a failure when `None`.
#[derive(Debug, Clone, Copy)]
pub struct StaticFreeSpace(pub Option<u64>);

impl FreeSpace for StaticFreeSpace {
    fn available_space(&self, _path: &Path) -> io::Result<u64> {
        self.0
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "free space unavailable"))
    }
}

/// Outcome of comparing free space against a requirement. Query failures
/// count as insufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceCheck {
    Enough { available: u64 },
    Short { available: Option<u64> },
}

impl SpaceCheck {
    pub fn is_enough(&self) -> bool {
        matches!(self, SpaceCheck::Enough { .. })
    }

    pub fn available(&self) -> Option<u64> {
        match *self {
            SpaceCheck::Enough { available } => Some(available),
            SpaceCheck::Short { available } => available,
        }
    }
}

pub fn check_space(guard: &dyn FreeSpace, path: &Path, required: u64) -> SpaceCheck {
    match guard.available_space(path) {
        Ok(available) if available >= required => SpaceCheck::Enough { available },
        Ok(available) => SpaceCheck::Short {
            available: Some(available),
        },
        Err(err) => {
            warn!(path = %path.display(), error = %err, "free space could not be determined");
            SpaceCheck::Short { available: None }
        }
    }
}
