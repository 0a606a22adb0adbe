//! The operations a host application calls, each reduced to a yes/no answer
//! with the details in the log.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::backup::{catalog, restore, retention, BackupOutcome, BackupScheduler};
use crate::clock::Clock;
use crate::collection::CollectionHandle;
use crate::config::SettingsStore;
use crate::error::Result;
use crate::repair::{QuarantineManager, RepairCoordinator, Recovery, Sqlite3Recovery};
use crate::types::BackupEntry;

pub struct Vault {
    scheduler: BackupScheduler,
    quarantine: Arc<QuarantineManager>,
    repair: RepairCoordinator,
}

impl Vault {
    /// Real filesystem, system clock and `sqlite3` for repairs.
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self::with_parts(
            BackupScheduler::new(settings),
            Arc::new(Sqlite3Recovery::default()),
        )
    }

    /// Build around an already configured scheduler; quarantine dates come
    /// from the scheduler's clock.
    pub fn with_parts(scheduler: BackupScheduler, recovery: Arc<dyn Recovery>) -> Self {
        let quarantine = Arc::new(QuarantineManager::new(Arc::clone(scheduler.clock())));
        let repair = RepairCoordinator::new(recovery, Arc::clone(&quarantine));
        Self {
            scheduler,
            quarantine,
            repair,
        }
    }

    pub fn scheduler(&self) -> &BackupScheduler {
        &self.scheduler
    }

    pub fn quarantine_manager(&self) -> &QuarantineManager {
        &self.quarantine
    }

    pub fn repair_coordinator(&self) -> &RepairCoordinator {
        &self.repair
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.scheduler.clock()
    }

    /// True once a backup worker has been started, not once it finished.
    pub fn perform_backup(
        &self,
        collection: &dyn CollectionHandle,
        interval_hours: u32,
        force: bool,
    ) -> bool {
        match self.scheduler.perform_backup(collection, interval_hours, force) {
            BackupOutcome::Started(_) => true,
            BackupOutcome::Skipped(reason) => {
                info!(path = %collection.path().display(), %reason, "backup skipped");
                false
            }
            BackupOutcome::Failed(err) => {
                error!(path = %collection.path().display(), error = %err, "backup failed");
                false
            }
        }
    }

    pub fn repair(&self, collection: &mut dyn CollectionHandle) -> bool {
        match self.repair.repair(collection) {
            Ok(_) => true,
            Err(err) => {
                error!(path = %collection.path().display(), error = %err, "repair failed");
                false
            }
        }
    }

    pub fn list_backups(&self, collection: &Path) -> Vec<BackupEntry> {
        match catalog::list_for_collection(collection) {
            Ok(backups) => backups,
            Err(err) => {
                warn!(path = %collection.display(), error = %err, "could not list backups");
                Vec::new()
            }
        }
    }

    pub fn prune_backups(&self, collection: &Path, keep: usize) -> bool {
        match catalog::list_for_collection(collection) {
            Ok(backups) => {
                retention::prune(&backups, keep);
                true
            }
            Err(err) => {
                warn!(path = %collection.display(), error = %err, "could not list backups");
                false
            }
        }
    }

    pub fn delete_backups(&self, collection: &Path, targets: &[PathBuf]) -> Result<bool> {
        retention::delete_backups(collection, targets)
    }

    pub fn quarantine(&self, collection: &Path, move_siblings: bool) -> bool {
        match self.quarantine.quarantine(collection, move_siblings) {
            Ok(_) => true,
            Err(err) => {
                error!(path = %collection.display(), error = %err, "quarantine failed");
                false
            }
        }
    }

    pub fn restore_backup(&self, collection: &Path, backup: &Path) -> Result<PathBuf> {
        let settings = self.scheduler.settings().settings()?;
        restore::restore_backup(
            collection,
            backup,
            &settings,
            self.scheduler.free_space().as_ref(),
            &self.quarantine,
        )
    }

    pub fn restore_if_missing(&self, collection: &Path) -> bool {
        let result = self.scheduler.settings().settings().and_then(|settings| {
            restore::restore_if_missing(
                collection,
                &settings,
                self.scheduler.free_space().as_ref(),
                &self.quarantine,
            )
        });
        match result {
            Ok(restored) => restored.is_some(),
            Err(err) => {
                error!(path = %collection.display(), error = %err, "could not restore collection");
                false
            }
        }
    }
}

impl Default for Vault {
    fn default() -> Self {
        Self::new(Arc::new(crate::config::MemorySettings::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::collection::CollectionPath;
    use crate::config::MemorySettings;
    use crate::disk::StaticFreeSpace;
    use crate::error::ColvaultError;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    struct NoRecovery;

    impl Recovery for NoRecovery {
        fn recover(&self, _source: &Path, _target: &Path) -> Result<()> {
            Err(ColvaultError::message("sqlite3 unavailable"))
        }
    }

    fn vault() -> Vault {
        let now = NaiveDate::from_ymd_opt(2024, 8, 1)
            .and_then(|d| d.and_hms_opt(7, 15, 0))
            .expect("date");
        let scheduler = BackupScheduler::new(Arc::new(MemorySettings::default()))
            .with_free_space(Arc::new(StaticFreeSpace(Some(u64::MAX))))
            .with_clock(Arc::new(FixedClock::new(now)));
        Vault::with_parts(scheduler, Arc::new(NoRecovery))
    }

    #[test]
    fn exposed_operations_answer_with_booleans() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("collection.anki2");
        fs::write(&path, vec![1u8; 12_000]).expect("write");
        let v = vault();

        assert!(v.list_backups(&path).is_empty());
        let job = v
            .scheduler()
            .perform_backup(&CollectionPath::new(&path), 5, false)
            .into_job()
            .expect("started");
        job.wait().expect("written");
        assert_eq!(v.list_backups(&path).len(), 1);
        assert!(!v.perform_backup(&CollectionPath::new(&path), 5, false));

        assert!(v.prune_backups(&path, 0));
        assert!(v.list_backups(&path).is_empty());
    }

    #[test]
    fn failed_repair_keeps_collection() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("collection.anki2");
        fs::write(&path, b"original").expect("write");
        let v = vault();
        assert!(!v.repair(&mut CollectionPath::new(&path)));
        assert_eq!(fs::read(&path).expect("read"), b"original");
        assert!(!dir.path().join("broken").exists());
    }

    #[test]
    fn quarantine_uses_vault_clock() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("collection.anki2");
        fs::write(&path, b"x").expect("write");
        assert!(vault().quarantine(&path, false));
        assert!(dir
            .path()
            .join("broken/collection-corrupt-2024-08-01.anki2")
            .is_file());
    }
}
