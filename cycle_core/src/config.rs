//! Configuration file support for cyclelog.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/cyclelog/config.toml`.

use crate::{EntryFormat, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_DIR: &str = "cyclelog";

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Preference store configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File name of the preference store inside the data directory
    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Keep the store readable by the current user only
    #[serde(default = "default_private")]
    pub private: bool,

    /// How start and end dates are joined in new records
    #[serde(default)]
    pub entry_format: EntryFormat,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            file_name: default_file_name(),
            private: default_private(),
            entry_format: EntryFormat::default(),
        }
    }
}

// Default value functions
fn home_dir_or_current() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| home_dir_or_current().join(".local/share"));
    base.join(APP_DIR)
}

fn default_file_name() -> String {
    "prefs.json".into()
}

fn default_private() -> bool {
    true
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| home_dir_or_current().join(".config"));
        base.join(APP_DIR).join("config.toml")
    }

    /// Full path of the preference store
    pub fn prefs_path(&self) -> PathBuf {
        self.data.data_dir.join(&self.storage.file_name)
    }

    fn validate(&self) -> Result<()> {
        let name = Path::new(&self.storage.file_name);
        if self.storage.file_name.is_empty() || name.components().count() != 1 {
            return Err(Error::Config(format!(
                "storage.file_name must be a plain file name, got {:?}",
                self.storage.file_name
            )));
        }
        Ok(())
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
