use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::buffer::ReuseOrder;
use crate::error::ConfigError;

/// Feeding thread settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkerConfig {
    /// Players with no more free space than this are skipped
    pub min_write_size: usize,
    /// Longest the worker sleeps between passes while players are registered
    pub nap_time_ms: u64,
    /// Refills slower than this are logged as warnings
    pub slow_refill_ms: u64,
}

impl WorkerConfig {
    pub fn nap_time(&self) -> Duration {
        Duration::from_millis(self.nap_time_ms)
    }

    pub fn slow_refill(&self) -> Duration {
        Duration::from_millis(self.slow_refill_ms)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            min_write_size: 512,
            nap_time_ms: 50,
            slow_refill_ms: 20,
        }
    }
}

/// Per-stream buffering
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Largest chunk uploaded into one native buffer
    pub buffer_size: usize,
    /// Audio kept queued ahead of the play cursor
    pub buffered_seconds: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 4096,
            buffered_seconds: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PoolConfig {
    pub reuse_order: ReuseOrder,
}

/// Complete configuration file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device name; the default device when unset
    pub device: Option<String>,
    pub worker: WorkerConfig,
    pub player: PlayerConfig,
    pub pool: PoolConfig,
}

/// Owns the settings file and the values loaded from it
pub struct ConfigManager {
    config: AudioConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load from the default location, falling back to defaults
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Ok(Self::with_path(config_path))
    }

    /// Load from an explicit file, falling back to defaults
    pub fn with_path(config_path: PathBuf) -> Self {
        let config = match Self::load_config(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Using default configuration: {}", e.user_message());
                AudioConfig::default()
            }
        };
        Self {
            config,
            config_path,
        }
    }

    pub fn get_config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut AudioConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_device(&mut self, device: Option<String>) -> Result<(), ConfigError> {
        self.config.device = device;
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = AudioConfig::default();
        self.save_config()
    }

    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::home_dir()
            .ok_or(ConfigError::ConfigDirNotFound)?
            .join(".config")
            .join("alstream");
        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<AudioConfig, ConfigError> {
        if !path.exists() {
            return Ok(AudioConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: AudioConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;
        Ok(())
    }

    /// Current settings as they would be written to disk
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(&self.config)?)
    }
}
