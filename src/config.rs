//! Application configuration
//!
//! Settings are read from `config.json` in the platform config directory
//! (`~/.config/ygoprice/config.json` on Linux). A missing file means defaults;
//! command-line flags override individual values after loading.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::StalenessPolicy;
use crate::data::prices::YGOPRICES_BASE_URL;

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for this schema
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `cache_expiry_days` is negative or not a number
    #[error("Invalid cache_expiry_days: {0} (must be a non-negative number)")]
    InvalidExpiry(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the price service
    pub base_url: String,

    /// Days a cached price stays fresh
    pub cache_expiry_days: f64,

    /// Per-request timeout; `None` waits for the transport
    pub request_timeout_secs: Option<u64>,

    /// Directory for the persistent store; `None` uses the platform data dir
    pub store_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: YGOPRICES_BASE_URL.to_string(),
            cache_expiry_days: 1.0,
            request_timeout_secs: None,
            store_dir: None,
        }
    }
}

impl Config {
    /// Default config file location, if one can be determined
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "ygoprice")?;
        Some(project_dirs.config_dir().join("config.json"))
    }

    /// Loads the config from the default path, or defaults if there is none
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                log::debug!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Loads the config from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.staleness_policy()?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validated staleness policy for `cache_expiry_days`
    pub fn staleness_policy(&self) -> Result<StalenessPolicy, ConfigError> {
        StalenessPolicy::new(self.cache_expiry_days)
            .ok_or(ConfigError::InvalidExpiry(self.cache_expiry_days))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
