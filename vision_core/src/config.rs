//! Configuration file support for MindVision.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/mindvision/config.toml`.

use crate::{Catalog, Error, Exercise, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub demo_user: DemoUserConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
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

impl DataConfig {
    /// Location of the SQLite entry database inside a data directory
    pub fn database_path(data_dir: &Path) -> PathBuf {
        data_dir.join("mindvision.db")
    }
}

/// Playback timer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tick_millis: default_tick_millis(),
        }
    }
}

impl PlaybackConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_millis)
    }
}

/// Identity used for the single demo user
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DemoUserConfig {
    #[serde(default = "default_demo_email")]
    pub email: String,

    #[serde(default = "default_demo_name")]
    pub name: String,
}

impl Default for DemoUserConfig {
    fn default() -> Self {
        Self {
            email: default_demo_email(),
            name: default_demo_name(),
        }
    }
}

/// Extra exercises appended after the built-in ones
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct CatalogConfig {
    #[serde(default)]
    pub custom: Vec<Exercise>,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("mindvision")
}

fn default_tick_millis() -> u64 {
    1000
}

fn default_demo_email() -> String {
    "temp@mindvision.app".into()
}

fn default_demo_name() -> String {
    "Temporary User".into()
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
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("mindvision").join("config.toml")
    }

    /// Reject values the rest of the system cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.playback.tick_millis == 0 {
            return Err(Error::Config("playback.tick_millis must be > 0".into()));
        }
        if self.demo_user.email.trim().is_empty() {
            return Err(Error::Config("demo_user.email must not be empty".into()));
        }
        Ok(())
    }

    /// Built-in exercises plus any configured custom ones
    pub fn build_catalog(&self) -> Result<Catalog> {
        Catalog::with_custom(&self.catalog.custom)
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
