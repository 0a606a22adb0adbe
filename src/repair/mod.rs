pub mod quarantine;

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::collection::CollectionHandle;
use crate::error::{ColvaultError, Result};
use crate::util::command::run_pipeline;

pub use quarantine::QuarantineManager;

/// External tool that rebuilds a damaged database at `source` into a fresh
/// file at `target`.
pub trait Recovery: Send + Sync {
    fn recover(&self, source: &Path, target: &Path) -> Result<()>;
}

/// `sqlite3 <source> .dump | sqlite3 <target>`.
#[derive(Debug, Clone)]
pub struct Sqlite3Recovery {
    program: PathBuf,
}

impl Sqlite3Recovery {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Sqlite3Recovery {
    fn default() -> Self {
        Self::new("sqlite3")
    }
}

impl Recovery for Sqlite3Recovery {
    fn recover(&self, source: &Path, target: &Path) -> Result<()> {
        let mut dump = Command::new(&self.program);
        dump.arg(source).arg(".dump");
        let mut load = Command::new(&self.program);
        load.arg(target);
        let (dump_rc, load_rc) = run_pipeline(&mut dump, &mut load)?;
        // Partial dumps exit non-zero; keep whatever was loaded.
        if dump_rc != 0 || load_rc != 0 {
            warn!(dump_rc, load_rc, source = %source.display(), "sqlite3 reported errors during recovery");
        }
        Ok(())
    }
}

/// Sibling file the recovered database is written to: `<path>.tmp`.
pub fn recovery_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Dump-and-reload repair of a corrupt collection.
pub struct RepairCoordinator {
    recovery: Arc<dyn Recovery>,
    quarantine: Arc<QuarantineManager>,
}

impl RepairCoordinator {
    pub fn new(recovery: Arc<dyn Recovery>, quarantine: Arc<QuarantineManager>) -> Self {
        Self {
            recovery,
            quarantine,
        }
    }

    /// Close the collection, rebuild it into `<path>.tmp`, quarantine the
    /// original and move the rebuilt file into its place. Returns where the
    /// original ended up.
    pub fn repair(&self, collection: &mut dyn CollectionHandle) -> Result<PathBuf> {
        let path = collection.path().to_path_buf();
        info!(path = %path.display(), "repair: closing collection");
        collection.close()?;

        let tmp = recovery_path(&path);
        if fs::symlink_metadata(&tmp).is_ok() {
            warn!(path = %tmp.display(), "removing stale recovery file");
            fs::remove_file(&tmp)?;
        }

        info!(source = %path.display(), target = %tmp.display(), "repair: running recovery");
        if let Err(err) = self.recovery.recover(&path, &tmp) {
            error!(path = %path.display(), error = %err, "repair: recovery tool failed");
        }
        if !tmp.is_file() {
            error!(path = %tmp.display(), "repair: recovery produced no file");
            return Err(ColvaultError::message(format!(
                "dump to {} failed",
                tmp.display()
            )));
        }

        let quarantined = self.quarantine.quarantine(&path, false)?;
        info!(path = %quarantined.display(), "repair: moved corrupt file to broken directory");

        fs::rename(&tmp, &path).map_err(|e| {
            error!(from = %tmp.display(), to = %path.display(), error = %e, "repair: could not install recovered file");
            ColvaultError::message(format!(
                "rename {} to {}: {}",
                tmp.display(),
                path.display(),
                e
            ))
        })?;
        info!(path = %path.display(), "repair: recovered collection installed");
        Ok(quarantined)
    }
}
