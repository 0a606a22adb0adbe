use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::config::model::Settings;
use crate::error::{ColvaultError, Result};

pub fn save_config(path: &Path, settings: &Settings) -> Result<()> {
    let data = serde_yaml::to_string(settings)
        .map_err(|e| ColvaultError::message(format!("encode config: {}", e)))?;
    let mut file = File::create(path)
        .map_err(|e| ColvaultError::message(format!("write config {}: {}", path.display(), e)))?;
    file.write_all(data.as_bytes())
        .map_err(|e| ColvaultError::message(format!("write config {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load::load_config;
    use tempfile::TempDir;

    #[test]
    fn saved_settings_load_back() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("colvault.yaml");
        let settings = Settings {
            retention_count: 2,
            no_space_left: true,
            ..Settings::default()
        };
        save_config(&path, &settings).expect("save");
        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.contains("backupMax: 2"));
        assert_eq!(load_config(&path).expect("load"), settings);
    }
}
