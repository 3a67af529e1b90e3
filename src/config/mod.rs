//! Configuration management for fetchline.
//!
//! Configuration is read from `~/.config/fetchline/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::queue::DEFAULT_WORKERS;

pub const DEFAULT_USER_AGENT: &str = concat!("fetchline/", env!("CARGO_PKG_VERSION"));
pub const DEFAULT_MAX_FILES: usize = 100;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding cached responses. Defaults to the platform cache dir.
    pub cache_directory: Option<PathBuf>,
    /// Maximum number of cached files; 0 disables caching.
    pub cache_max_files: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Maximum concurrent transfers.
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_directory: None,
            cache_max_files: DEFAULT_MAX_FILES,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/fetchline/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("fetchline").join("config.toml"))
    }

    /// The configured cache directory, or `<platform cache dir>/fetchline`.
    pub fn cache_directory(&self) -> Result<PathBuf, ConfigError> {
        match &self.cache_directory {
            Some(dir) => Ok(dir.clone()),
            None => dirs::cache_dir()
                .map(|d| d.join("fetchline"))
                .ok_or(ConfigError::NoCacheDir),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Create a default config file with comments.
    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        format!(
            r##"# fetchline configuration

# Where cached responses are stored. Defaults to the platform cache
# directory, e.g. ~/.cache/fetchline on Linux.
# cache_directory = "/var/tmp/fetchline"

# Maximum number of cached responses. When a new response is cached and the
# limit is exceeded, the oldest files are deleted first. 0 disables caching.
cache_max_files = {max_files}

# Per-request timeout in seconds
timeout_secs = {timeout}

# User-Agent header sent with every request
user_agent = "{user_agent}"

# Maximum number of transfers running at the same time
workers = {workers}
"##,
            max_files = DEFAULT_MAX_FILES,
            timeout = DEFAULT_TIMEOUT_SECS,
            user_agent = DEFAULT_USER_AGENT,
            workers = DEFAULT_WORKERS,
        )
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Could not determine cache directory")]
    NoCacheDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl From<ConfigError> for crate::app::FetchError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
