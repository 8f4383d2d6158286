use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::navigation::ViewMode;

pub const DEFAULT_CONFIG_FILE: &str = "mokuyomi.toml";
pub const DEFAULT_DATABASE_FILE: &str = "mokuyomi.db";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub lexicon_path: Option<PathBuf>,
    pub default_view_mode: ViewMode,
    /// Base directory that relative volume paths resolve against.
    pub library_dir: Option<PathBuf>,
    pub log_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_FILE),
            lexicon_path: None,
            default_view_mode: ViewMode::default(),
            library_dir: None,
            log_filter: None,
        }
    }
}

impl Config {
    pub fn resolve_volume_path(&self, volume: &Path) -> PathBuf {
        match &self.library_dir {
            Some(library) if volume.is_relative() => library.join(volume),
            _ => volume.to_path_buf(),
        }
    }
}

pub fn load_config_from_file(file_path: &Path) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(file_path)
        .map_err(|source| ConfigError::Read { path: file_path.to_path_buf(), source })?;
    let loaded_config = toml::from_str::<Config>(&contents)
        .map_err(|source| ConfigError::Parse { path: file_path.to_path_buf(), source })?;

    if let Some(library) = &loaded_config.library_dir {
        if !library.is_dir() {
            return Err(ConfigError::InvalidDirectory {
                path: file_path.to_path_buf(),
                field: "library_dir",
                value: library.display().to_string(),
            });
        }
    }
    Ok(loaded_config)
}

/// An explicit path must exist. Without one, `mokuyomi.toml` in the working
/// directory is used when present, otherwise defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    match explicit {
        Some(path) => load_config_from_file(path),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.is_file() {
                load_config_from_file(default_path)
            } else {
                Ok(Config::default())
            }
        }
    }
}
