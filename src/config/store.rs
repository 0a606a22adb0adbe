use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::load::load_config;
use crate::config::model::Settings;
use crate::config::save::save_config;
use crate::error::{ColvaultError, Result};

/// Where the backup subsystem reads its preferences and records the
/// low-space warning for the host to show later.
pub trait SettingsStore: Send + Sync {
    fn settings(&self) -> Result<Settings>;
    fn set_no_space_left(&self, value: bool) -> Result<()>;
}

/// Settings persisted in a YAML file.
#[derive(Debug)]
pub struct YamlSettings {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl YamlSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for YamlSettings {
    fn settings(&self) -> Result<Settings> {
        load_config(&self.path)
    }

    fn set_no_space_left(&self, value: bool) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ColvaultError::message("settings lock poisoned"))?;
        let mut settings = load_config(&self.path)?;
        if settings.no_space_left == value {
            return Ok(());
        }
        settings.no_space_left = value;
        save_config(&self.path, &settings)
    }
}

/// Settings held in memory, for embedding hosts and tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    inner: Mutex<Settings>,
}

impl MemorySettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Mutex::new(settings),
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut Settings)) {
        if let Ok(mut guard) = self.inner.lock() {
            f(&mut guard);
        }
    }
}

impl SettingsStore for MemorySettings {
    fn settings(&self) -> Result<Settings> {
        self.inner
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| ColvaultError::message("settings lock poisoned"))
    }

    fn set_no_space_left(&self, value: bool) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ColvaultError::message("settings lock poisoned"))?;
        guard.no_space_left = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn yaml_store_persists_low_space_flag() {
        let dir = TempDir::new().expect("tempdir");
        let store = YamlSettings::new(dir.path().join("colvault.yaml"));
        assert!(!store.settings().expect("settings").no_space_left);
        store.set_no_space_left(true).expect("flag");
        let reread = YamlSettings::new(store.path().to_path_buf());
        assert!(reread.settings().expect("settings").no_space_left);
    }

    #[test]
    fn memory_store_updates() {
        let store = MemorySettings::default();
        store.update(|s| s.retention_count = 1);
        store.set_no_space_left(true).expect("flag");
        let settings = store.settings().expect("settings");
        assert_eq!(settings.retention_count, 1);
        assert!(settings.no_space_left);
    }
}
