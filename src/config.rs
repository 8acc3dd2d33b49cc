//! Configuration file handling for facelens.
//!
//! Loads configuration from `~/.config/facelens/config.toml` or a custom
//! path. Every field is optional; the CLI merges its own flags over these
//! values, and built-in defaults fill the rest.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Configuration file structure for facelens.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Default)]
pub struct CameraConfig {
    /// Camera index
    #[serde(default)]
    pub device: Option<usize>,
    /// Capture width in pixels
    #[serde(default)]
    pub width: Option<u32>,
    /// Capture height in pixels
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DetectorConfig {
    /// Path to the Haar cascade model file
    #[serde(default)]
    pub model: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct DisplayConfig {
    /// Preview window title
    #[serde(default)]
    pub window: Option<String>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist and parse. With no path, the default
    /// location is used when present and defaults are returned otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::read_file(path),
            None => {
                let path = default_path();
                if path.exists() {
                    Self::read_file(&path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError { path, source } => {
                write!(
                    f,
                    "Failed to read config file '{}': {}",
                    path.display(),
                    source
                )
            }
            ConfigError::ParseError { path, source } => {
                write!(
                    f,
                    "Failed to parse config file '{}': {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::IoError { source, .. } => Some(source),
            ConfigError::ParseError { source, .. } => Some(source),
        }
    }
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("facelens").join("config.toml"))
        .unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config/facelens/config.toml")
        })
}
