//! Configuration management with file persistence
//!
//! The config file only ever names *where* keys come from. Key material itself is
//! accepted from the environment alone.

pub mod env;
pub mod keys;

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub use env::{InMemoryEnv, ReadEnv, SystemEnv};
pub use keys::{EnvKeySettings, KeyEnvNames, KeySettings, KeySettingsProvider, parse_override_flag};

/// Overrides the config directory
pub const CONFIG_DIR_ENV: &str = "CREDVAULT_CONFIG_DIR";

/// Overrides the database path
pub const DATABASE_PATH_ENV: &str = "CREDVAULT_DATABASE_PATH";

/// Credvault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding credential records
    pub database_path: PathBuf,
    /// Environment variable names for the key sources
    pub keys: KeyEnvNames,
    /// Must stay empty; present only so a misplaced key is detected and rejected
    #[serde(skip_serializing)]
    pub encryption_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            keys: KeyEnvNames::default(),
            encryption_key: None,
        }
    }
}

/// Get the default database path
pub fn default_database_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("credvault").join("credentials.db")
    } else {
        PathBuf::from("credentials.db")
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir<E: ReadEnv + ?Sized>(env: &E) -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env.var(CONFIG_DIR_ENV) {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("credvault")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path<E: ReadEnv + ?Sized>(env: &E) -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir(env)?.join("config.toml"))
    }

    /// Load configuration from the process environment's config location
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with_env(&SystemEnv)
    }

    /// Load configuration, or defaults when no file exists, then apply env overrides
    pub fn load_with_env<E: ReadEnv + ?Sized>(env: &E) -> anyhow::Result<Self> {
        let path = Self::config_path(env)?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Config::default()
        };

        if let Ok(db_path) = env.var(DATABASE_PATH_ENV) {
            if !db_path.trim().is_empty() {
                config.database_path = PathBuf::from(db_path);
            }
        }

        Ok(config)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the given file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.encryption_key.is_some() {
            return Err(anyhow!(
                "Encryption keys must be provided via environment variables ({}), not stored in configuration",
                self.keys.primary
            ));
        }
        Ok(())
    }
}
