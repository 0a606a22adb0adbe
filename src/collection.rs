use std::path::{Path, PathBuf};

use crate::error::Result;

/// File name of the primary database, also the entry name inside backups.
pub const COLLECTION_FILENAME: &str = "collection.anki2";

/// The database layer's view of an open (or openable) collection.
pub trait CollectionHandle {
    fn path(&self) -> &Path;
    fn is_open(&self) -> bool;
    fn close(&mut self) -> Result<()>;
}

/// A collection known only by its path; nothing holds it open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionPath {
    path: PathBuf,
}

impl CollectionPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CollectionHandle for CollectionPath {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_open(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
