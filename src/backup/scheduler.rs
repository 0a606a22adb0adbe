use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::Duration;
use tracing::{debug, error, info, warn};

use crate::backup::archive::write_collection;
use crate::backup::catalog::{self, last_backup_time};
use crate::backup::naming::{parse_timestamp, to_backup_name, Timestamp};
use crate::backup::retention;
use crate::clock::{Clock, SystemClock};
use crate::collection::CollectionHandle;
use crate::config::SettingsStore;
use crate::disk::{check_space, FreeSpace, FsFreeSpace, SpaceCheck};
use crate::error::{ColvaultError, Result};
use crate::types::{file_name_of, same_mtime, BackupEntry, CollectionFile};
use crate::util::paths::{backup_dir_for, data_root, ensure_dir};

/// Collections with a backup currently being decided or written.
type InFlight = Arc<Mutex<HashSet<PathBuf>>>;

/// Releases a collection's in-flight claim when dropped.
struct InFlightGuard {
    set: InFlight,
    key: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Ok(mut set) = self.set.lock() {
            set.remove(&self.key);
        }
    }
}

fn claim(set: &InFlight, collection: &Path) -> Option<InFlightGuard> {
    let key = fs::canonicalize(collection).unwrap_or_else(|_| collection.to_path_buf());
    let mut guard = match set.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if !guard.insert(key.clone()) {
        return None;
    }
    Some(InFlightGuard {
        set: Arc::clone(set),
        key,
    })
}

/// Why no backup was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Disabled,
    MissingCollection,
    InProgress,
    Unchanged,
    TooRecent { last: Timestamp },
    AlreadyExists(PathBuf),
    InsufficientSpace { required: u64, available: Option<u64> },
    TooSmall { size: u64, minimum: u64 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => f.write_str("backups are disabled"),
            SkipReason::MissingCollection => f.write_str("collection file does not exist"),
            SkipReason::InProgress => f.write_str("a backup of this collection is already running"),
            SkipReason::Unchanged => f.write_str("collection unchanged since last backup"),
            SkipReason::TooRecent { last } => write!(f, "last backup at {} is too recent", last),
            SkipReason::AlreadyExists(path) => write!(f, "{} already exists", path.display()),
            SkipReason::InsufficientSpace { required, available } => match available {
                Some(available) => write!(
                    f,
                    "not enough free space: need {} bytes, {} available",
                    required, available
                ),
                None => write!(f, "free space unknown; need {} bytes", required),
            },
            SkipReason::TooSmall { size, minimum } => write!(
                f,
                "collection is {} bytes, below the {} byte minimum",
                size, minimum
            ),
        }
    }
}

/// A backup running on its own thread. Dropping this detaches the worker;
/// it still runs to completion.
#[derive(Debug)]
pub struct BackupJob {
    destination: PathBuf,
    handle: JoinHandle<Result<BackupEntry>>,
}

impl BackupJob {
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Block until the worker is done.
    pub fn wait(self) -> Result<BackupEntry> {
        self.handle
            .join()
            .map_err(|_| ColvaultError::message("backup worker panicked"))?
    }
}

#[derive(Debug)]
pub enum BackupOutcome {
    Started(BackupJob),
    Skipped(SkipReason),
    Failed(ColvaultError),
}

impl BackupOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, BackupOutcome::Started(_))
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            BackupOutcome::Skipped(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn into_job(self) -> Option<BackupJob> {
        match self {
            BackupOutcome::Started(job) => Some(job),
            _ => None,
        }
    }
}

/// Decides when a collection needs a backup and writes it in the background.
pub struct BackupScheduler {
    settings: Arc<dyn SettingsStore>,
    free_space: Arc<dyn FreeSpace>,
    clock: Arc<dyn Clock>,
    in_flight: InFlight,
}

impl BackupScheduler {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            settings,
            free_space: Arc::new(FsFreeSpace),
            clock: Arc::new(SystemClock),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_free_space(mut self, free_space: Arc<dyn FreeSpace>) -> Self {
        self.free_space = free_space;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn settings(&self) -> &Arc<dyn SettingsStore> {
        &self.settings
    }

    pub fn free_space(&self) -> &Arc<dyn FreeSpace> {
        &self.free_space
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run the admission checks and, if they all pass, start copying the
    /// collection into a new backup on a detached thread.
    pub fn perform_backup(
        &self,
        collection: &dyn CollectionHandle,
        interval_hours: u32,
        force: bool,
    ) -> BackupOutcome {
        let path = collection.path();
        let settings = match self.settings.settings() {
            Ok(settings) => settings,
            Err(err) => return BackupOutcome::Failed(err),
        };
        if !settings.backup_enabled && !force {
            debug!(path = %path.display(), "backups are disabled");
            return BackupOutcome::Skipped(SkipReason::Disabled);
        }

        let source = match CollectionFile::stat(path) {
            Ok(source) => source,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "collection missing; nothing to back up");
                return BackupOutcome::Skipped(SkipReason::MissingCollection);
            }
            Err(err) => return BackupOutcome::Failed(ColvaultError::Io(err)),
        };

        let Some(in_flight) = claim(&self.in_flight, path) else {
            info!(path = %path.display(), "backup already in progress");
            return BackupOutcome::Skipped(SkipReason::InProgress);
        };

        let backup_dir = backup_dir_for(path);
        let backups = match catalog::list(&backup_dir, &source.file_name()) {
            Ok(backups) => backups,
            Err(err) => return BackupOutcome::Failed(err),
        };

        if let Some(latest) = catalog::latest(&backups) {
            if same_mtime(latest.modified, source.modified) {
                debug!(path = %path.display(), "no backup necessary; collection unchanged");
                return BackupOutcome::Skipped(SkipReason::Unchanged);
            }
        }

        let now = self.clock.now();
        if !force {
            if let Some(last) = last_backup_time(&backups) {
                if now < last + Duration::hours(i64::from(interval_hours)) {
                    debug!(path = %path.display(), last = %last, interval_hours, "last backup too recent");
                    return BackupOutcome::Skipped(SkipReason::TooRecent { last });
                }
            }
        }

        let destination = backup_dir.join(to_backup_name(&source.file_name(), now));
        if destination.exists() {
            debug!(path = %destination.display(), "backup file already exists");
            return BackupOutcome::Skipped(SkipReason::AlreadyExists(destination));
        }

        let required = settings.required_free_space(source.size);
        let space_root = if backup_dir.is_dir() {
            backup_dir.clone()
        } else {
            data_root(path)
        };
        let space = check_space(self.free_space.as_ref(), &space_root, required);
        if let SpaceCheck::Short { available } = space {
            error!(path = %path.display(), required, ?available, "not enough free space to back up");
            if available.is_some() {
                if let Err(err) = self.settings.set_no_space_left(true) {
                    warn!(error = %err, "could not record low space warning");
                }
            }
            return BackupOutcome::Skipped(SkipReason::InsufficientSpace {
                required,
                available,
            });
        }

        if source.size < settings.min_valid_collection_size {
            debug!(path = %path.display(), size = source.size, "collection too small to be valid");
            return BackupOutcome::Skipped(SkipReason::TooSmall {
                size: source.size,
                minimum: settings.min_valid_collection_size,
            });
        }

        if collection.is_open() {
            warn!(path = %path.display(), "collection is open during backup");
        }

        ensure_dir(&backup_dir);
        let retention_count = settings.retention_count;
        let worker_dest = destination.clone();
        info!(
            source = %path.display(),
            dest = %destination.display(),
            "launching backup thread"
        );
        let spawned = thread::Builder::new()
            .name("colvault-backup".to_string())
            .spawn(move || {
                let _in_flight = in_flight;
                let result = write_backup(&source, &worker_dest, Some(retention_count));
                match &result {
                    Ok(entry) => info!(path = %entry.path.display(), "backup created"),
                    Err(err) => error!(path = %worker_dest.display(), error = %err, "backup failed"),
                }
                result
            });
        match spawned {
            Ok(handle) => BackupOutcome::Started(BackupJob {
                destination,
                handle,
            }),
            Err(err) => BackupOutcome::Failed(ColvaultError::Io(err)),
        }
    }

    /// Write a backup named `file_name` right now, on the calling thread.
    /// Only space admission applies; the result is not pruned.
    pub fn perform_backup_in_foreground(
        &self,
        collection: &dyn CollectionHandle,
        file_name: &str,
    ) -> Result<BackupEntry> {
        let path = collection.path();
        let settings = self.settings.settings()?;
        let source = CollectionFile::stat(path)?;
        let _claim = claim(&self.in_flight, path).ok_or_else(|| {
            ColvaultError::message(format!("backup of {} already in progress", path.display()))
        })?;

        let backup_dir = backup_dir_for(path);
        ensure_dir(&backup_dir);
        let required = settings.required_free_space(source.size);
        if let SpaceCheck::Short { available } =
            check_space(self.free_space.as_ref(), &backup_dir, required)
        {
            warn!(path = %path.display(), required, ?available, "could not back up: no free disk space");
            return Err(ColvaultError::OutOfSpace {
                required,
                available,
            });
        }
        write_backup(&source, &backup_dir.join(file_name), None)
    }

    /// Whether a collection that has not been backed up for `days` should get
    /// one now regardless of the usual interval.
    pub fn safety_backup_needed(&self, collection: &Path, days: u32) -> Result<bool> {
        let settings = self.settings.settings()?;
        if !settings.backup_enabled {
            return Ok(false);
        }
        let source = match CollectionFile::stat(collection) {
            Ok(source) => source,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };
        let backups = catalog::list(&backup_dir_for(collection), &source.file_name())?;
        let Some(latest) = catalog::latest(&backups) else {
            return Ok(true);
        };
        if same_mtime(latest.modified, source.modified) {
            return Ok(false);
        }
        Ok(match last_backup_time(&backups) {
            Some(last) => last + Duration::days(i64::from(days)) < self.clock.now(),
            None => true,
        })
    }

    /// Whether the backup directory's filesystem has at least the configured
    /// margin free.
    pub fn enough_disk_space(&self, collection: &Path) -> bool {
        let margin = match self.settings.settings() {
            Ok(settings) => settings.min_free_space_bytes(),
            Err(err) => {
                warn!(error = %err, "could not read settings");
                return false;
            }
        };
        let backup_dir = backup_dir_for(collection);
        ensure_dir(&backup_dir);
        check_space(self.free_space.as_ref(), &backup_dir, margin).is_enough()
    }
}

/// Archive `source` into `dest` via a hidden temp file in the same
/// directory, so a failed copy never leaves a partial backup behind.
fn write_backup(
    source: &CollectionFile,
    dest: &Path,
    retention_count: Option<usize>,
) -> Result<BackupEntry> {
    let dir = dest
        .parent()
        .ok_or_else(|| ColvaultError::message(format!("{} has no parent", dest.display())))?;
    let tmp = tempfile::Builder::new()
        .prefix(".colvault-")
        .suffix(".partial")
        .tempfile_in(dir)?;
    let copied = write_collection(&source.path, tmp.as_file())?;
    debug!(bytes = copied, dest = %dest.display(), "archive written");

    // Stamp with the source's mtime: the next decision compares against it.
    tmp.as_file().set_modified(source.modified)?;
    tmp.persist_noclobber(dest)
        .map_err(|e| ColvaultError::Io(e.error))?;

    if let Some(keep) = retention_count {
        let backups = catalog::list(dir, &source.file_name())?;
        retention::prune(&backups, keep);
    }

    Ok(BackupEntry {
        timestamp: parse_timestamp(&file_name_of(dest)),
        modified: source.modified,
        path: dest.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::collection::CollectionPath;
    use crate::config::{MemorySettings, Settings};
    use crate::disk::StaticFreeSpace;
    use chrono::NaiveDate;
    use std::time::{Duration as StdDuration, SystemTime};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        collection: PathBuf,
        settings: Arc<MemorySettings>,
        clock: Arc<FixedClock>,
        scheduler: BackupScheduler,
    }

    fn start_time() -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(9, 30, 0))
            .expect("date")
    }

    fn fixture_with(size: usize, free: Option<u64>, settings: Settings) -> Fixture {
        let dir = TempDir::new().expect("tempdir");
        let collection = dir.path().join("collection.anki2");
        fs::write(&collection, vec![7u8; size]).expect("write collection");
        let settings = Arc::new(MemorySettings::new(settings));
        let clock = Arc::new(FixedClock::new(start_time()));
        let scheduler = BackupScheduler::new(settings.clone())
            .with_free_space(Arc::new(StaticFreeSpace(free)))
            .with_clock(clock.clone());
        Fixture {
            _dir: dir,
            collection,
            settings,
            clock,
            scheduler,
        }
    }

    fn fixture(size: usize) -> Fixture {
        fixture_with(size, Some(u64::MAX), Settings::default())
    }

    fn touch_collection(path: &Path, offset_secs: u64) {
        let file = fs::OpenOptions::new().write(true).open(path).expect("open");
        let mtime = SystemTime::UNIX_EPOCH + StdDuration::from_secs(1_700_000_000 + offset_secs);
        file.set_modified(mtime).expect("set mtime");
    }

    fn backup_names(collection: &Path) -> Vec<String> {
        catalog::list_for_collection(collection)
            .expect("list")
            .iter()
            .map(|b| b.file_name())
            .collect()
    }

    fn run(f: &Fixture, interval: u32, force: bool) -> BackupOutcome {
        f.scheduler
            .perform_backup(&CollectionPath::new(&f.collection), interval, force)
    }

    fn run_and_wait(f: &Fixture, interval: u32, force: bool) -> BackupEntry {
        run(f, interval, force)
            .into_job()
            .expect("backup started")
            .wait()
            .expect("backup written")
    }

    #[test]
    fn first_backup_is_written_and_stamped() {
        let f = fixture(20_000);
        touch_collection(&f.collection, 0);
        let entry = run_and_wait(&f, 5, false);
        assert_eq!(
            entry.path.file_name().and_then(|n| n.to_str()),
            Some("collection-2024-05-01-09-30.apkg")
        );
        let meta = fs::metadata(&entry.path).expect("stat backup");
        let source = fs::metadata(&f.collection).expect("stat collection");
        assert!(same_mtime(meta.modified().expect("mtime"), source.modified().expect("mtime")));
        assert_eq!(entry.timestamp, Some(start_time()));
    }

    #[test]
    fn unchanged_collection_is_not_backed_up_again() {
        let f = fixture(20_000);
        touch_collection(&f.collection, 0);
        run_and_wait(&f, 5, false);
        f.clock.advance(Duration::hours(10));
        let outcome = run(&f, 5, true);
        assert_eq!(outcome.skip_reason(), Some(&SkipReason::Unchanged));
        assert_eq!(backup_names(&f.collection).len(), 1);
    }

    #[test]
    fn interval_throttles_unforced_backups() {
        let f = fixture(20_000);
        touch_collection(&f.collection, 0);
        run_and_wait(&f, 5, false);
        touch_collection(&f.collection, 60);
        f.clock.advance(Duration::hours(4));
        let outcome = run(&f, 5, false);
        assert!(matches!(
            outcome.skip_reason(),
            Some(SkipReason::TooRecent { .. })
        ));
        assert_eq!(backup_names(&f.collection).len(), 1);

        f.clock.advance(Duration::hours(1));
        run_and_wait(&f, 5, false);
        assert_eq!(backup_names(&f.collection).len(), 2);
    }

    #[test]
    fn force_ignores_interval() {
        let f = fixture(20_000);
        touch_collection(&f.collection, 0);
        run_and_wait(&f, 5, false);
        touch_collection(&f.collection, 60);
        f.clock.advance(Duration::minutes(1));
        run_and_wait(&f, 5, true);
        assert_eq!(backup_names(&f.collection).len(), 2);
    }

    #[test]
    fn disabled_unless_forced() {
        let f = fixture_with(
            20_000,
            Some(u64::MAX),
            Settings {
                backup_enabled: false,
                ..Settings::default()
            },
        );
        assert_eq!(run(&f, 5, false).skip_reason(), Some(&SkipReason::Disabled));
        run_and_wait(&f, 5, true);
        assert_eq!(backup_names(&f.collection).len(), 1);
    }

    #[test]
    fn same_minute_name_is_not_overwritten() {
        let f = fixture(20_000);
        touch_collection(&f.collection, 0);
        run_and_wait(&f, 0, true);
        touch_collection(&f.collection, 60);
        let outcome = run(&f, 0, true);
        assert!(matches!(
            outcome.skip_reason(),
            Some(SkipReason::AlreadyExists(_))
        ));
    }

    #[test]
    fn low_space_skips_and_sets_flag() {
        let f = fixture_with(20_000, Some(10 * 1024 * 1024), Settings::default());
        let outcome = run(&f, 5, true);
        assert_eq!(
            outcome.skip_reason(),
            Some(&SkipReason::InsufficientSpace {
                required: 20_000 + 10 * 1024 * 1024,
                available: Some(10 * 1024 * 1024),
            })
        );
        assert!(f.settings.settings().expect("settings").no_space_left);
        assert!(backup_names(&f.collection).is_empty());
    }

    #[test]
    fn unknown_free_space_fails_closed() {
        let f = fixture_with(20_000, None, Settings::default());
        let outcome = run(&f, 5, true);
        assert!(matches!(
            outcome.skip_reason(),
            Some(SkipReason::InsufficientSpace { available: None, .. })
        ));
        assert!(!f.settings.settings().expect("settings").no_space_left);
    }

    #[test]
    fn tiny_collection_is_never_backed_up() {
        let f = fixture(5_000);
        for force in [false, true] {
            assert_eq!(
                run(&f, 5, force).skip_reason(),
                Some(&SkipReason::TooSmall {
                    size: 5_000,
                    minimum: 10_000
                })
            );
        }
        assert!(!backup_dir_for(&f.collection).exists());
    }

    #[test]
    fn missing_collection_is_skipped() {
        let f = fixture(20_000);
        fs::remove_file(&f.collection).expect("remove");
        assert_eq!(
            run(&f, 5, true).skip_reason(),
            Some(&SkipReason::MissingCollection)
        );
    }

    #[test]
    fn concurrent_trigger_is_single_flight() {
        let f = fixture(20_000);
        let held = claim(&f.scheduler.in_flight, &f.collection).expect("claim");
        assert_eq!(run(&f, 5, true).skip_reason(), Some(&SkipReason::InProgress));
        drop(held);
        run_and_wait(&f, 5, true);
    }

    #[test]
    fn retention_keeps_latest_two_of_three() {
        let f = fixture_with(
            600_000,
            Some(u64::MAX),
            Settings {
                retention_count: 2,
                ..Settings::default()
            },
        );
        let mut names = Vec::new();
        for step in 0..3u64 {
            touch_collection(&f.collection, step * 60);
            let entry = run_and_wait(&f, 0, true);
            names.push(entry.file_name());
            f.clock.advance(Duration::minutes(1));
        }
        assert_eq!(backup_names(&f.collection), names[1..].to_vec());
    }

    #[test]
    fn no_partial_files_left_in_backup_dir() {
        let f = fixture(20_000);
        run_and_wait(&f, 5, true);
        let leftovers: Vec<_> = fs::read_dir(backup_dir_for(&f.collection))
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".partial"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn failed_copy_leaves_nothing_behind() {
        let f = fixture(20_000);
        let source = CollectionFile::stat(&f.collection).expect("stat");
        fs::remove_file(&f.collection).expect("remove");
        let backup_dir = backup_dir_for(&f.collection);
        fs::create_dir_all(&backup_dir).expect("mkdir");

        let dest = backup_dir.join(to_backup_name(&source.file_name(), start_time()));
        assert!(write_backup(&source, &dest, Some(8)).is_err());
        assert_eq!(fs::read_dir(&backup_dir).expect("read dir").count(), 0);
        assert!(backup_names(&f.collection).is_empty());
    }

    struct OpenCollection(PathBuf);

    impl CollectionHandle for OpenCollection {
        fn path(&self) -> &Path {
            &self.0
        }

        fn is_open(&self) -> bool {
            true
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn open_collection_is_still_backed_up() {
        let f = fixture(20_000);
        let outcome = f
            .scheduler
            .perform_backup(&OpenCollection(f.collection.clone()), 5, false);
        assert!(outcome.is_started());
        outcome.into_job().expect("job").wait().expect("written");
        assert_eq!(backup_names(&f.collection).len(), 1);
    }

    #[test]
    fn foreground_backup_reports_out_of_space() {
        let f = fixture_with(20_000, Some(1), Settings::default());
        let result = f
            .scheduler
            .perform_backup_in_foreground(&CollectionPath::new(&f.collection), "ankiDroidv16.colpkg");
        assert!(matches!(result, Err(ColvaultError::OutOfSpace { .. })));
    }

    #[test]
    fn foreground_backup_writes_named_file() {
        let f = fixture(20_000);
        let entry = f
            .scheduler
            .perform_backup_in_foreground(&CollectionPath::new(&f.collection), "ankiDroidv16.colpkg")
            .expect("backup");
        assert!(entry.path.ends_with("backup/ankiDroidv16.colpkg"));
        assert!(entry.path.is_file());
    }

    #[test]
    fn safety_backup_after_threshold() {
        let f = fixture(20_000);
        assert!(f.scheduler.safety_backup_needed(&f.collection, 3).expect("check"));
        touch_collection(&f.collection, 0);
        run_and_wait(&f, 5, true);
        assert!(!f.scheduler.safety_backup_needed(&f.collection, 3).expect("check"));
        touch_collection(&f.collection, 60);
        f.clock.advance(Duration::days(2));
        assert!(!f.scheduler.safety_backup_needed(&f.collection, 3).expect("check"));
        f.clock.advance(Duration::days(2));
        assert!(f.scheduler.safety_backup_needed(&f.collection, 3).expect("check"));
    }

    #[test]
    fn enough_disk_space_uses_margin() {
        let f = fixture_with(20_000, Some(10 * 1024 * 1024), Settings::default());
        assert!(f.scheduler.enough_disk_space(&f.collection));
        let g = fixture_with(20_000, Some(1024), Settings::default());
        assert!(!g.scheduler.enough_disk_space(&g.collection));
    }
}
