//! Application configuration management.
//!
//! This module handles loading and saving the application configuration,
//! which includes the data directory, the last used username, the history
//! size and the password hashing parameters.
//!
//! Configuration is stored at `~/.config/thermolog/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::password::{HashParams, MIN_PASSWORD_LENGTH};
use crate::history::DEFAULT_HISTORY_LIMIT;

/// Application name used for config/data/cache directory paths
pub const APP_NAME: &str = "thermolog";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Credential store file name in the data directory
const USERS_FILE: &str = "users.json";

/// Per-user history directory name in the data directory
const HISTORY_DIR: &str = "history";

/// Overrides the data directory
pub const DATA_DIR_ENV: &str = "THERMOLOG_DATA_DIR";

/// Prefills the login form
pub const USERNAME_ENV: &str = "THERMOLOG_USERNAME";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub last_username: Option<String>,
    pub history_limit: usize,
    pub min_password_length: usize,
    pub hashing: HashParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            last_username: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            min_password_length: MIN_PASSWORD_LENGTH,
            hashing: HashParams::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Location of the config file.
    pub fn path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// `THERMOLOG_DATA_DIR`, then the configured directory, then the platform data dir.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    pub fn users_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(USERS_FILE))
    }

    pub fn history_dir(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(HISTORY_DIR))
    }

    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
