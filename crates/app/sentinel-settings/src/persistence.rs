use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{FocusConfig, SettingsError, SettingsResult};

pub const SETTINGS_DIR: &str = "focussentinel";
pub const SETTINGS_FILE: &str = "extension.json";

/// On-disk envelope, mirroring the single `config` key the popup stores.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSettings {
    config: Option<FocusConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSettings {
    pub config: FocusConfig,
    /// True when no config existed and the defaults were just written.
    /// The host has not seen them yet and needs an initial sync.
    pub seeded: bool,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_default_path() -> SettingsResult<Self> {
        let dir = dirs::config_dir().ok_or(SettingsError::MissingConfigDir)?;
        Ok(Self::new(dir.join(SETTINGS_DIR).join(SETTINGS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the stored config, or `None` if nothing was saved yet.
    pub fn load(&self) -> SettingsResult<Option<FocusConfig>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let stored: StoredSettings = serde_json_lenient::from_str(&contents)?;
        Ok(stored.config)
    }

    pub fn load_or_seed(&self) -> SettingsResult<LoadedSettings> {
        if let Some(config) = self.load()? {
            return Ok(LoadedSettings {
                config,
                seeded: false,
            });
        }

        debug!("No stored focus config at {:?}; seeding defaults", self.path);
        let config = FocusConfig::default();
        self.save(&config)?;
        Ok(LoadedSettings {
            config,
            seeded: true,
        })
    }

    pub fn save(&self, config: &FocusConfig) -> SettingsResult<()> {
        let stored = StoredSettings {
            config: Some(config.clone()),
        };
        let contents = serde_json_lenient::to_string_pretty(&stored)?;
        create_dirs_then_write(&self.path, contents).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

/// Write atomically, creating all leading directories.
fn create_dirs_then_write(file_path: &Path, contents: impl AsRef<[u8]>) -> std::io::Result<()> {
    let parent_dir = file_path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "File path has no parent directory",
        )
    })?;
    fs::create_dir_all(parent_dir)?;

    let temp_path = parent_dir.join(format!(".tmp_{}_{SETTINGS_FILE}", std::process::id()));
    fs::write(&temp_path, contents.as_ref())?;
    fs::rename(&temp_path, file_path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("nested").join(SETTINGS_FILE))
    }

    #[test]
    fn load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store_in(&dir).load().unwrap(), None);
    }

    #[test]
    fn first_load_seeds_and_persists_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let loaded = store.load_or_seed().unwrap();
        assert!(loaded.seeded);
        assert_eq!(loaded.config, FocusConfig::default());
        assert!(store.path().exists());

        let again = store.load_or_seed().unwrap();
        assert!(!again.seeded);
        assert_eq!(again.config, FocusConfig::default());
    }

    #[test]
    fn save_then_load_keeps_whitelist_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let config = FocusConfig {
            is_active: true,
            whitelist: vec!["z.com".into(), "a.com".into(), "m.com".into()],
        };

        store.save(&config).unwrap();
        assert_eq!(store.load().unwrap(), Some(config));
    }

    #[test]
    fn envelope_without_config_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), r#"{"config": null}"#).unwrap();

        let loaded = store.load_or_seed().unwrap();
        assert!(loaded.seeded);
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{not json").unwrap();

        assert!(matches!(store.load(), Err(SettingsError::Parse(_))));
    }

    #[test]
    fn save_leaves_no_temp_files_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&FocusConfig::default()).unwrap();

        let names: Vec<_> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(SETTINGS_FILE)]);
    }
}
