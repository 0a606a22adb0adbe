use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::config::model::Settings;
use crate::error::{ColvaultError, ConfigError, Result};

/// Load settings from YAML. A missing file means "all defaults".
pub fn load_config(path: &Path) -> Result<Settings> {
    let mut contents = String::new();
    match File::open(path) {
        Ok(mut file) => {
            file.read_to_string(&mut contents)
                .map_err(ColvaultError::Io)?;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Settings::default()),
        Err(err) => return Err(ColvaultError::Io(err)),
    }
    if contents.trim().is_empty() {
        return Ok(Settings::default());
    }
    let settings: Settings =
        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&settings)?;
    Ok(settings)
}

fn validate(settings: &Settings) -> Result<()> {
    if settings.min_free_space_mb.checked_mul(1024 * 1024).is_none() {
        return Err(ConfigError::Invalid(format!(
            "minFreeSpaceMb {} is too large",
            settings.min_free_space_mb
        ))
        .into());
    }
    Ok(())
}
